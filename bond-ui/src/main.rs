mod app;
mod bridge;
mod contracts;
mod dto;
mod login;

fn main() {
    leptos::mount_to_body(app::App);
}
