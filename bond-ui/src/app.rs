use crate::bridge;
use crate::contracts::Contracts;
use crate::login::Login;
use ledger_core::pages::PageId;
use ledger_core::session::SessionContext;
use leptos::*;
use wasm_bindgen_futures::spawn_local;

#[component]
pub fn App() -> impl IntoView {
    let session = create_rw_signal(None::<SessionContext>);
    let page = create_rw_signal(initial_page());
    let error = create_rw_signal(None::<String>);

    spawn_local(async move {
        match bridge::current_session().await {
            Ok(current) => session.set(current),
            Err(e) => error.set(Some(e)),
        }
    });

    let logout = move |_| {
        spawn_local(async move {
            match bridge::logout().await {
                Ok(()) => session.set(None),
                Err(e) => error.set(Some(e)),
            }
        });
    };

    let on_login = Callback::new(move |s: SessionContext| session.set(Some(s)));

    view! {
      <Show
        when=move || session.get().is_some()
        fallback=move || view! { <Login on_login=on_login/> }
      >
        <div class="layout">
          <nav>
            <div>{move || session.get().map(|s| s.party).unwrap_or_default()}</div>
            <button on:click=logout>"Log out"</button>
            <For
              each=move || PageId::ALL
              key=|p| p.slug()
              children=move |p| view! {
                <button
                  class:active=move || page.get() == p
                  on:click=move |_| {
                    page.set(p);
                    remember_page(p);
                  }
                >
                  {p.title()}
                </button>
              }
            />
          </nav>
          <main>
            <Show when=move || error.get().is_some() fallback=|| ()>
              <pre class="error">{move || error.get().unwrap_or_default()}</pre>
            </Show>
            {move || {
                let current = page.get();
                view! { <Contracts page=current/> }
            }}
          </main>
        </div>
      </Show>
    }
}

/// The page named by the URL fragment, so a reload stays on the same table.
fn initial_page() -> PageId {
    web_sys::window()
        .and_then(|w| w.location().hash().ok())
        .and_then(|hash| PageId::from_slug(hash.trim_start_matches('#')))
        .unwrap_or(PageId::OngoingAuctions)
}

fn remember_page(page: PageId) {
    if let Some(window) = web_sys::window() {
        if let Err(err) = window.location().set_hash(page.slug()) {
            leptos::logging::warn!("cannot update location: {err:?}");
        }
    }
}
