fn main() -> std::process::ExitCode {
    fire_broadcast_lib::run()
}
