use std::process::ExitCode;

fn main() -> ExitCode {
    mqtt_can_bridge_lib::run()
}
