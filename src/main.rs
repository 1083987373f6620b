fn main() {
    if let Err(e) = hapticbeat_lib::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
