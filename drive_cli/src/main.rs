//! # Drive Command Line
//!
//! Interactive client for the drive executable. Each line typed at the prompt is sent as a single
//! command datagram and the reply, if any, is printed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fs, io,
    net::{SocketAddr, UdpSocket},
    path::Path,
    time::Duration,
};
use color_eyre::{Result, eyre::WrapErr};
use rustyline::{error::ReadlineError, DefaultEditor};
use structopt::{clap::AppSettings, StructOpt};

use comms_if::drive::{Command, Intensity, Reply};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "Drive $ ";
const HISTORY_PATH: &str = "data/drive_cli_history.txt";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Send drive commands to a drive executable.
#[derive(Debug, StructOpt)]
#[structopt(name = "drive_cli")]
struct Opts {
    /// Address of the drive executable
    #[structopt(long, default_value = "127.0.0.1:9999")]
    addr: SocketAddr,

    /// Time to wait for a reply to each command, in milliseconds
    #[structopt(long, default_value = "500")]
    timeout_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Commands accepted at the prompt.
#[derive(Debug, StructOpt)]
#[structopt(name = "drive", setting = AppSettings::NoBinaryName)]
enum ReplCmd {
    /// Drive forwards, at the given intensity in percent if provided
    #[structopt(name = "fwd")]
    Forward {
        pct: Option<i64>
    },

    /// Drive backwards, at the given intensity in percent if provided
    #[structopt(name = "back")]
    Backward {
        pct: Option<i64>
    },

    /// Stop the motors
    #[structopt(name = "stop")]
    Stop,

    /// Check the drive executable is alive
    #[structopt(name = "ping")]
    Ping,

    /// Exit the command line
    #[structopt(name = "quit")]
    Quit,
}

/// What to do with a line entered at the prompt.
#[derive(Debug, PartialEq)]
enum Action {
    Send(Command),
    Quit,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let socket = connect(opts.addr, Duration::from_millis(opts.timeout_ms))
        .wrap_err_with(|| format!("Could not open a socket to {}", opts.addr))?;

    let mut rl = DefaultEditor::new()
        .wrap_err("Could not initialise the line editor")?;
    if rl.load_history(HISTORY_PATH).is_err() {
        println!("No history detected");
    }

    println!("Sending commands to {}, type `help` for a list of commands", opts.addr);

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).wrap_err("Could not read from the prompt")
        };

        if line.trim().is_empty() {
            continue
        }
        rl.add_history_entry(line.as_str()).ok();

        match parse_line(&line) {
            Ok(Action::Send(cmd)) => report(cmd, exchange(&socket, cmd)),
            Ok(Action::Quit) => break,
            Err(msg) => println!("{}", msg)
        }
    }

    println!("Exiting...");

    if let Some(dir) = Path::new(HISTORY_PATH).parent() {
        fs::create_dir_all(dir).wrap_err("Could not create the history directory")?;
    }
    rl.save_history(HISTORY_PATH)
        .wrap_err("Could not save the command history")?;

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a line from the prompt into an action, or the message to show if it's invalid.
fn parse_line(line: &str) -> Result<Action, String> {
    let cmd = ReplCmd::from_iter_safe(line.split_whitespace())
        .map_err(|e| e.message)?;

    Ok(match cmd {
        ReplCmd::Forward { pct } => Action::Send(Command::Forward(pct.map(Intensity::new))),
        ReplCmd::Backward { pct } => Action::Send(Command::Backward(pct.map(Intensity::new))),
        ReplCmd::Stop => Action::Send(Command::Stop),
        ReplCmd::Ping => Action::Send(Command::Ping),
        ReplCmd::Quit => Action::Quit
    })
}

/// Open a UDP socket connected to the drive executable.
fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<UdpSocket> {
    let local: SocketAddr = match addr {
        SocketAddr::V4(_) => ([0u8; 4], 0).into(),
        SocketAddr::V6(_) => ([0u16; 8], 0).into()
    };

    let socket = UdpSocket::bind(local)?;
    socket.connect(addr)?;
    socket.set_read_timeout(Some(timeout))?;

    Ok(socket)
}

/// Send a command and wait for the reply.
///
/// Returns `Ok(None)` if no reply arrived within the socket's read timeout.
fn exchange(socket: &UdpSocket, cmd: Command) -> io::Result<Option<Vec<u8>>> {
    socket.send(cmd.encode().as_bytes())?;

    let mut buf = [0u8; 64];
    match socket.recv(&mut buf) {
        Ok(len) => Ok(Some(buf[..len].to_vec())),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(None)
        },
        Err(e) => Err(e)
    }
}

/// Print the outcome of an exchange. None of the outcomes end the session.
fn report(cmd: Command, outcome: io::Result<Option<Vec<u8>>>) {
    println!("{}", describe(cmd, &outcome));
}

fn describe(cmd: Command, outcome: &io::Result<Option<Vec<u8>>>) -> String {
    let expected = cmd.reply();

    match outcome {
        Ok(Some(bytes)) => match Reply::parse(bytes) {
            Some(r) if r == expected => format!("{:?}", r),
            _ => format!(
                "Unexpected reply to {:?}: {:?}",
                cmd,
                String::from_utf8_lossy(bytes)
            )
        },
        Ok(None) => format!("No reply to {:?}", cmd),
        Err(e) => format!("Could not send {:?}: {}", cmd, e)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("fwd 50"),
            Ok(Action::Send(Command::Forward(Some(Intensity::new(50)))))
        );
        assert_eq!(parse_line("fwd"), Ok(Action::Send(Command::Forward(None))));
        assert_eq!(
            parse_line("  back   250 "),
            Ok(Action::Send(Command::Backward(Some(Intensity::MAX))))
        );
        assert_eq!(parse_line("stop"), Ok(Action::Send(Command::Stop)));
        assert_eq!(parse_line("ping"), Ok(Action::Send(Command::Ping)));
        assert_eq!(parse_line("quit"), Ok(Action::Quit));

        assert!(parse_line("jump").is_err());
        assert!(parse_line("fwd fast").is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(Command::Ping, &Ok(Some(b"OK\n".to_vec()))), "Ok");
        assert_eq!(describe(Command::Stop, &Ok(Some(b"ACK\n".to_vec()))), "Ack");
        assert!(describe(Command::Ping, &Ok(Some(b"ACK\n".to_vec()))).starts_with("Unexpected"));
        assert!(describe(Command::Stop, &Ok(None)).starts_with("No reply"));
    }

    #[test]
    fn test_exchange_with_server() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let client = connect(addr, Duration::from_secs(2)).unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (len, from) = server.recv_from(&mut buf).unwrap();
            server.send_to(b"ACK\n", from).unwrap();
            buf[..len].to_vec()
        });

        let reply = exchange(&client, Command::Forward(Some(Intensity::new(40)))).unwrap();
        assert_eq!(reply, Some(b"ACK\n".to_vec()));
        assert_eq!(handle.join().unwrap(), b"F,40".to_vec());
    }

    #[test]
    fn test_exchange_timeout() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client = connect(server.local_addr().unwrap(), Duration::from_millis(50)).unwrap();

        assert_eq!(exchange(&client, Command::Ping).unwrap(), None);
    }
}
