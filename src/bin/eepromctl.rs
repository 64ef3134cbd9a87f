use eefs::{
    AddressWidth, Config, Connector, Erase, ErrorKind, Geometry, ImageConnector, Session,
    StdDelay,
};
use log::{error, LevelFilter};
use std::io::{Read, Write};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::process::exit;
use structopt::StructOpt;

fn parse_u8(s: &str) -> Result<u8, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

#[derive(StructOpt)]
#[structopt(name = "eepromctl", about = "Manage files on an I2C EEPROM")]
struct Opt {
    /// EEPROM image file, created blank if missing.
    #[structopt(long, parse(from_os_str), required_unless = "i2c", conflicts_with = "i2c")]
    image: Option<PathBuf>,

    /// i2c-dev adapter, e.g. /dev/i2c-1.
    #[structopt(long, parse(from_os_str))]
    i2c: Option<PathBuf>,

    #[structopt(long, default_value = "0x50", parse(try_from_str = parse_u8))]
    address: u8,

    /// Use one-byte memory addresses (parts of 256 bytes or less).
    #[structopt(long)]
    eight_bit: bool,

    #[structopt(long, default_value = "512")]
    block_size: usize,

    #[structopt(long, default_value = "64")]
    block_count: usize,

    #[structopt(long, default_value = "64")]
    page_size: usize,

    /// Wait after each page write, in milliseconds.
    #[structopt(long, default_value = "5")]
    settle_ms: u64,

    /// Fill pattern written on erase. Without it erase is skipped.
    #[structopt(long, parse(try_from_str = parse_u8))]
    fill: Option<u8>,

    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Show whether the bus is connected and the filesystem mounted.
    Status,
    Reconnect,
    /// Write an empty filesystem. Destroys every file.
    Format,
    List,
    /// Print a file to stdout.
    Read { name: String },
    /// Store a file, from --data or stdin.
    Write {
        name: String,
        #[structopt(long)]
        data: Option<String>,
    },
    Delete { name: String },
    Rename { old: String, new: String },
    Copy { name: String, new_name: String },
    BatchDelete {
        #[structopt(required = true)]
        names: Vec<String>,
    },
    /// List files whose name or contents contain the query.
    Search { query: String },
    Info { name: String },
    /// Usage summary.
    Storage,
}

impl Opt {
    fn config(&self) -> Config {
        Config {
            device_address: self.address,
            address_width: if self.eight_bit {
                AddressWidth::Eight
            } else {
                AddressWidth::Sixteen
            },
            geometry: Geometry {
                block_size: self.block_size,
                block_count: self.block_count,
            },
            page_size: self.page_size,
            settle_delay: std::time::Duration::from_millis(self.settle_ms),
            erase: self.fill.map_or(Erase::Skip, Erase::Fill),
        }
    }
}

fn fail(kind: ErrorKind) -> ! {
    eprintln!("error {}: {}", kind.status_code(), kind);
    exit(1);
}

fn run<C: Connector>(mut session: Session<C, StdDelay>, cmd: Command) -> Result<(), ErrorKind> {
    match cmd {
        Command::Status => {
            let status = session.status();
            println!("connected: {}", status.connected);
            println!("mounted: {}", status.mounted);
        }
        Command::Reconnect => {
            session.reconnect()?;
            println!("mounted");
        }
        Command::Format => session.format()?,
        Command::List => {
            for name in session.list()? {
                println!("{}", name);
            }
        }
        Command::Read { name } => {
            let content = session.read(&name)?;
            let mut stdout = std::io::stdout();
            if let Err(e) = stdout.write_all(&content).and_then(|_| stdout.flush()) {
                error!("stdout: {}", e);
                exit(2);
            }
        }
        Command::Write { name, data } => {
            let content = match data {
                Some(data) => data.into_bytes(),
                None => {
                    let mut content = Vec::new();
                    if let Err(e) = std::io::stdin().read_to_end(&mut content) {
                        error!("stdin: {}", e);
                        exit(2);
                    }
                    content
                }
            };
            session.write(&name, &content)?;
        }
        Command::Delete { name } => session.delete(&name)?,
        Command::Rename { old, new } => session.rename(&old, &new)?,
        Command::Copy { name, new_name } => session.copy(&name, &new_name)?,
        Command::BatchDelete { names } => {
            let mut failed = None;
            for (name, outcome) in session.batch_delete(&names) {
                match outcome {
                    Ok(()) => println!("{}: deleted", name),
                    Err(e) => {
                        println!("{}: {} {}", name, e.status_code(), e);
                        failed = failed.or(Some(e));
                    }
                }
            }
            if let Some(e) = failed {
                return Err(e);
            }
        }
        Command::Search { query } => {
            let hits = session.search(&query)?;
            for name in hits.names {
                println!("{}", name);
            }
            for name in hits.skipped {
                eprintln!("unreadable: {}", name);
            }
        }
        Command::Info { name } => {
            let info = session.file_info(&name)?;
            println!("{}\t{}", info.name, info.size);
        }
        Command::Storage => {
            let info = session.storage_info();
            println!("total: {}", info.total);
            println!("used: {}", info.used);
            println!("free: {}", info.free);
            println!("block_size: {}", info.block_size);
            println!("block_count: {}", info.block_count);
            for name in info.skipped {
                eprintln!("unreadable: {}", name);
            }
        }
    }
    Ok(())
}

fn main() {
    let opt = Opt::from_args();

    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp_nanos();
    if opt.verbose {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.init();

    let config = opt.config();
    let result = match (&opt.image, &opt.i2c) {
        (Some(image), _) => {
            let connector = ImageConnector::new(image, config.geometry.capacity());
            Session::open(config, connector, StdDelay).and_then(|s| run(s, opt.cmd))
        }
        #[cfg(target_os = "linux")]
        (None, Some(dev)) => {
            let connector = eefs::I2cDevConnector::new(dev);
            Session::open(config, connector, StdDelay).and_then(|s| run(s, opt.cmd))
        }
        _ => {
            error!("No usable bus selected");
            exit(2);
        }
    };
    if let Err(kind) = result {
        fail(kind);
    }
}
