use image::{imageops, GrayImage};
use ptouch_lp::{Bitmap, Config, Registry};
use std::env;
//
// cargo run --example print_image label.png [copies]
//
// The image is scaled to the loaded tape. Landscape images are turned so
// their long side runs along the tape.
//

const THRESHOLD: u8 = 128;

/// Grayscale image seen through a fixed threshold.
struct Threshold {
    image: GrayImage,
}

impl Bitmap for Threshold {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn is_black(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y).0[0] < THRESHOLD
    }
}

fn print_usage() {
    println!("Usage: cargo run --example print_image FILE [COPIES]");
    println!("  FILE     PNG or any format the image crate reads");
    println!("  COPIES   number of chained labels, 1 by default");
    println!("\nThe printer is taken from PTOUCH_DEVICE, /dev/usb/lp0 by default.");
}

fn main() {
    dotenvy::dotenv().ok();

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{}:{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let file = &args[1];
    let copies: usize = match args.get(2).map(|s| s.parse()) {
        None => 1,
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            eprintln!("Error: COPIES must be a positive number");
            print_usage();
            return;
        }
    };

    let device = env::var("PTOUCH_DEVICE").unwrap_or_else(|_| "/dev/usb/lp0".to_string());

    let mut printer = match Registry::with_defaults().open(&device, Config::new()) {
        Ok(printer) => printer,
        Err(err) => panic!("cannot open {}: {}", device, err),
    };

    let info = match printer.info() {
        Ok(info) => info,
        Err(err) => panic!("cannot read printer status: {}", err),
    };
    println!("Loaded media: {}", info.media_name);

    let mut image = match image::open(file) {
        Ok(image) => image.to_luma8(),
        Err(err) => panic!("cannot load {}: {}", file, err),
    };
    if image.width() > image.height() {
        image = imageops::rotate90(&image);
    }

    let width = info.bounds.width;
    let height = (image.height() as u64 * width as u64 / image.width() as u64).max(1) as u32;
    let image = imageops::resize(&image, width, height, imageops::FilterType::Triangle);
    println!("Printing {} x {}x{}px", copies, width, height);

    let label = Threshold { image };
    let pages: Vec<&dyn Bitmap> = (0..copies).map(|_| &label as &dyn Bitmap).collect();

    match printer.print(&pages) {
        Ok(()) => println!("done"),
        Err(err) => println!("ERROR {:#?}", err),
    }
}
