#[rocket::launch]
fn rocket() -> _ {
    let rocket = chatlog_server::rocket();
    log::info!("starting chatlog server");
    rocket
}
