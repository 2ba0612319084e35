fn main() {
    if let Err(err) = herd_ledger::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
