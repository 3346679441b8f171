use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use onvif_client::types::device::GetDeviceInformation;
use onvif_client::types::media::{GetProfiles, GetStreamUri};
use onvif_client::{discover, Config, Credentials, Device, DeviceParams};

#[derive(Parser, Debug)]
#[command(author, version, about = "Find and query ONVIF cameras")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe for cameras through a network interface (name or IPv4 address)
    Discover {
        interface: String,
        #[arg(short, long, default_value = "")]
        user: String,
        #[arg(short, long, default_value = "")]
        password: String,
    },
    /// Open a session with one camera at host[:port]
    Connect {
        address: String,
        #[arg(short, long, default_value = "")]
        user: String,
        #[arg(short, long, default_value = "")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env();

    match args.command {
        Command::Discover {
            interface,
            user,
            password,
        } => {
            println!("----------------------- DEVICE DISCOVERY ----------------------");

            let credentials = credentials(&user, &password);
            let devices = discover(&interface, credentials.as_ref(), &config).await?;

            if devices.is_empty() {
                return Err(anyhow!("[Main] No devices found on {interface}"));
            }

            println!("[Main] Found {} devices!", devices.len());
            for device in &devices {
                let params = device.params();
                println!(
                    "[Main] {} name: {} model: {} type: {} uuid: {}",
                    device.address(),
                    params.name,
                    params.model,
                    params.device_type(),
                    params.uuid
                );
                print_device(device).await;
            }
        }
        Command::Connect {
            address,
            user,
            password,
        } => {
            let params = DeviceParams::new(address).with_credentials(&user, &password);
            let device = Device::with_config(params, config).await?;

            print_device(&device).await;
        }
    }

    Ok(())
}

async fn print_device(device: &Device) {
    println!("----------------------- {} ----------------------", device.address());

    for (service, url) in device.get_services().iter() {
        println!("[Main] endpoint {service}: {url}");
    }

    match device.call_method(&GetDeviceInformation {}).await {
        Ok(info) => println!(
            "[Main] {} {} firmware {} serial {}",
            info.manufacturer, info.model, info.firmware_version, info.serial_number
        ),
        Err(e) => eprintln!("[Main] GetDeviceInformation failed: {e}"),
    }

    if let Err(e) = print_stream_uri(device).await {
        eprintln!("[Main] No stream uri: {e}");
    }
}

async fn print_stream_uri(device: &Device) -> Result<()> {
    let profiles = device.call_method(&GetProfiles {}).await?;
    let profile = profiles
        .profiles
        .first()
        .ok_or_else(|| anyhow!("device has no media profiles"))?;

    let uri = device.call_method(&GetStreamUri::rtsp(&profile.token)).await?;
    println!("[Main] stream uri ({}): {}", profile.name, uri.media_uri.uri);

    Ok(())
}

/// Empty user or password means no credentials.
fn credentials(user: &str, password: &str) -> Option<Credentials> {
    DeviceParams::new("").with_credentials(user, password).credentials
}
