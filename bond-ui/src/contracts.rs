use crate::bridge::TauriLedger;
use ledger_core::dispatcher::{ControlKey, Dispatch};
use ledger_core::pages::PageId;
use ledger_core::table::{DialogView, RowView, TableBody, TableHandle};
use leptos::logging::warn;
use leptos::*;
use wasm_bindgen_futures::spawn_local;

/// One page's contract table, live for as long as the component is mounted.
#[component]
pub fn Contracts(page: PageId) -> impl IntoView {
    let spec = page.spec();
    let handle = TableHandle::new(spec.table());
    let table = create_rw_signal(handle.view());
    handle.set_listener(move |view| table.set(view.clone()));

    let driver = handle.clone();
    spawn_local(async move { driver.drive(&TauriLedger, spec.template).await });

    let handle = store_value(handle);
    on_cleanup(move || handle.with_value(TableHandle::unmount));

    let press = move |key: ControlKey, contract_id: contract_registry::ContractId| match key {
        ControlKey::Action(index) => {
            let h = handle.get_value();
            spawn_local(async move {
                if let Dispatch::Failed(err) = h.invoke(&TauriLedger, index, &contract_id).await {
                    warn!("action failed: {err}");
                }
            });
        }
        ControlKey::Dialog(index) => {
            if let Err(err) = handle.with_value(|h| h.open_dialog(index, &contract_id)) {
                warn!("cannot open dialog: {err}");
            }
        }
    };

    let row = move |row: RowView| {
        let cells = row
            .cells
            .iter()
            .map(|cell| view! { <td>{cell.to_string()}</td> })
            .collect_view();
        let controls = row
            .controls
            .into_iter()
            .map(|control| {
                let contract_id = row.contract_id.clone();
                view! {
                  <td>
                    <button
                      disabled=control.busy
                      on:click=move |_| press(control.key, contract_id.clone())
                    >
                      {control.label}
                    </button>
                  </td>
                }
            })
            .collect_view();
        view! { <tr>{cells}{controls}</tr> }
    };

    // Row updates while typing must not rebuild the inputs.
    let dialog_key = create_memo(move |_| table.with(|view| view.dialog.as_ref().map(DialogView::key)));

    let notices = move || {
        table
            .get()
            .notices
            .into_iter()
            .map(|notice| {
                let id = notice.id;
                view! {
                  <div class="notice">
                    <span>{notice.message}</span>
                    <button on:click=move |_| {
                      handle.with_value(|h| h.dismiss_notice(id));
                    }>"Dismiss"</button>
                  </div>
                }
            })
            .collect_view()
    };

    view! {
      <section>
        <h2>{page.title()}</h2>
        {notices}
        <table>
          <thead>
            <tr>
              {move || table.get().header.into_iter().map(|h| view! { <th>{h}</th> }).collect_view()}
            </tr>
          </thead>
          <tbody>
            {move || match table.get().body {
                TableBody::Empty(message) => view! {
                  <tr><td class="empty" colspan="100">{message}</td></tr>
                }
                .into_view(),
                TableBody::Rows(rows) => rows.into_iter().map(row).collect_view(),
            }}
          </tbody>
        </table>
        {move || {
            dialog_key
                .get()
                .and_then(|_| table.get_untracked().dialog)
                .map(|dialog| view! { <Dialog dialog=dialog handle=handle/> })
        }}
      </section>
    }
}

#[component]
fn Dialog(dialog: DialogView, handle: StoredValue<TableHandle>) -> impl IntoView {
    let fields = dialog
        .fields
        .into_iter()
        .map(|field| {
            let label = field.label.clone();
            view! {
              <label>
                {field.label}
                <input
                  prop:value=field.value
                  on:input=move |ev| {
                    if let Err(err) = handle.with_value(|h| h.set_field(&label, &event_target_value(&ev))) {
                        warn!("{err}");
                    }
                  }
                />
              </label>
            }
        })
        .collect_view();

    let submit = move |_| {
        let h = handle.get_value();
        spawn_local(async move {
            match h.submit_dialog(&TauriLedger).await {
                Ok(Dispatch::Failed(err)) => warn!("dialog command failed: {err}"),
                Ok(_) => {}
                Err(err) => warn!("dialog not submitted: {err}"),
            }
        });
    };

    view! {
      <div class="modal">
        <div class="panel">
          <h3>{dialog.title}</h3>
          <div class="meta">{dialog.contract_id.to_string()}</div>
          {fields}
          {dialog.error.map(|e| view! { <div class="error">{e}</div> })}
          <div class="row">
            <button on:click=move |_| handle.with_value(TableHandle::cancel_dialog)>"Cancel"</button>
            <button on:click=submit>"Okay"</button>
          </div>
        </div>
      </div>
    }
}
