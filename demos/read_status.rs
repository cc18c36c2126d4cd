use ptouch_lp::{Config, Registry};
use std::env;
//
// cargo run --example read_status [/dev/usb/lp0]
//
// The device node may also be given as PTOUCH_DEVICE, or in a .env file.
//

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("PTOUCH_DEVICE").ok())
        .unwrap_or_else(|| "/dev/usb/lp0".to_string());

    let registry = Registry::with_defaults();
    let mut printer = match registry.open(&path, Config::new()) {
        Ok(printer) => printer,
        Err(err) => {
            eprintln!("cannot open {}: {}", path, err);
            std::process::exit(1);
        }
    };

    match printer.status() {
        Ok(status) => {
            println!("{}", status);
            if let Some(err) = status.error() {
                println!("{}", err);
            }
        }
        Err(err) => println!("Error {:?}", err),
    }

    match printer.info() {
        Ok(info) => println!(
            "{}: {}px wide, at least {}px long at {} dpi",
            info.media_name, info.bounds.width, info.bounds.min_length, info.dpi
        ),
        Err(err) => println!("Error {}", err),
    }

    if let Err(err) = printer.close() {
        eprintln!("close failed: {}", err);
    }
}
