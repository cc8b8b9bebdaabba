use crate::bridge;
use ledger_core::session::{LoginMode, LoginOptions, SessionContext};
use leptos::*;
use wasm_bindgen_futures::spawn_local;

#[component]
pub fn Login(on_login: Callback<SessionContext>) -> impl IntoView {
    let options = create_rw_signal(None::<LoginOptions>);
    let party = create_rw_signal(String::new());
    let password = create_rw_signal(String::new());
    let loading = create_rw_signal(false);
    let error = create_rw_signal(None::<String>);

    spawn_local(async move {
        match bridge::login_options().await {
            Ok(o) => options.set(Some(o)),
            Err(e) => error.set(Some(e)),
        }
    });

    let submit = move || {
        let p = party.get_untracked();
        if p.is_empty() || loading.get_untracked() {
            return;
        }
        let pw = password.get_untracked();
        loading.set(true);
        spawn_local(async move {
            match bridge::login(&p, &pw).await {
                Ok(session) => {
                    error.set(None);
                    on_login.call(session);
                }
                Err(e) => error.set(Some(e)),
            }
            loading.set(false);
        });
    };

    let hosted_redirect = move |_| {
        let Some(LoginOptions {
            mode: LoginMode::Hosted { login_url },
            ..
        }) = options.get_untracked()
        else {
            return;
        };
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.location().set_href(&login_url) {
                error.set(Some(format!("redirect failed: {e:?}")));
            }
        }
    };

    view! {
      <div class="login">
        <h1>"BOND Issuance"</h1>
        <Show when=move || error.get().is_some() fallback=|| ()>
          <div class="error">"Something is wrong with your login or password"</div>
          <div class="meta">{move || error.get().unwrap_or_default()}</div>
        </Show>
        <Show
          when=move || options.get().is_some_and(|o| !o.mode.is_local_dev())
          fallback=|| ()
        >
          <button on:click=hosted_redirect>"Log in with hosted identity"</button>
          <div>"OR"</div>
        </Show>
        <select
          on:change=move |ev| party.set(event_target_value(&ev))
          on:keydown=move |ev: ev::KeyboardEvent| {
            if ev.key() == "Enter" {
                submit();
            }
          }
        >
          <option value="" selected=move || party.get().is_empty()>"Select Party"</option>
          {move || {
              options
                  .get()
                  .map(|o| o.parties)
                  .unwrap_or_default()
                  .into_iter()
                  .map(|p| view! { <option value=p.clone()>{p}</option> })
                  .collect_view()
          }}
        </select>
        <input
          type="password"
          placeholder="Password"
          prop:value=move || password.get()
          on:input=move |ev| password.set(event_target_value(&ev))
          on:keydown=move |ev: ev::KeyboardEvent| {
            if ev.key() == "Enter" {
                submit();
            }
          }
        />
        <button
          disabled=move || party.get().is_empty() || loading.get()
          on:click=move |_| submit()
        >
          {move || if loading.get() { "Logging in…" } else { "Login" }}
        </button>
      </div>
    }
}
