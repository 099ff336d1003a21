//! syncstream CLI — collaborator tooling around the core library.
//!
//! USAGE:
//!     syncstream gen
//!         Prints a fresh hex-encoded 256-bit key to stdout.
//!
//!     syncstream <hex_key> <aad> <message>
//!         Seals `message` under `hex_key` with associated data `aad`,
//!         then immediately opens it back and prints the recovered
//!         plaintext. Demonstrates the round trip; does not touch the
//!         network or any device fleet state.
//!
//! Exit codes: 0 success, 1 usage, 2 runtime error.

use std::process::ExitCode;

use syncstream::{from_hex, hex_of, mint_key, Cipher};

fn print_usage() {
    eprintln!(
        "syncstream — authenticated control-channel demo\n\
         \n\
         USAGE:\n\
         \x20   syncstream gen\n\
         \x20       print a fresh hex-encoded 256-bit key\n\
         \n\
         \x20   syncstream <hex_key> <aad> <message>\n\
         \x20       seal <message> under <hex_key>, then open it back\n"
    );
}

fn cmd_gen() -> Result<(), String> {
    let key = mint_key().map_err(|e| e.to_string())?;
    println!("{}", hex_of(&key));
    Ok(())
}

fn cmd_roundtrip(hex_key: &str, aad: &str, message: &str) -> Result<(), String> {
    let raw = from_hex(hex_key).map_err(|_| "hex_key is not valid hex".to_string())?;
    let key: [u8; 32] = raw
        .try_into()
        .map_err(|_| "hex_key must decode to exactly 32 bytes".to_string())?;

    let cipher = Cipher::new(key);
    let pkt = cipher
        .seal(message.as_bytes(), aad.as_bytes())
        .map_err(|e| format!("seal failed: {e}"))?;
    let opened = cipher
        .open(&pkt, aad.as_bytes())
        .map_err(|e| format!("open failed: {e}"))?;

    let recovered = String::from_utf8(opened.take())
        .map_err(|_| "recovered plaintext is not utf-8".to_string())?;

    println!("nonce:  {}", hex_of(&pkt.nonce));
    println!("tag:    {}", hex_of(&pkt.mac));
    println!("opened: {recovered}");
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    match args.len() {
        2 if args[1] == "gen" => match cmd_gen() {
            Ok(()) => ExitCode::from(0),
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        },
        4 => match cmd_roundtrip(&args[1], &args[2], &args[3]) {
            Ok(()) => ExitCode::from(0),
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        },
        _ => {
            print_usage();
            ExitCode::from(1)
        }
    }
}
