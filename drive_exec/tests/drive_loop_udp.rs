//! End to end tests of the drive loop over a real UDP socket.
//!
//! The loop runs in a background thread with simulated motors and a manual clock, and the test acts
//! as the client.

use std::{
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use comms_if::drive::{Command, Intensity, Reply};
use drive_lib::{
    drive_loop::{DriveLoop, DriveLoopError, LoopConfig},
    drive_server::DriveServer,
    motor_ctrl::{DriveCtrl, SimMotor, SimMotorProbe},
    watchdog::ManualClock,
};

type TestLoop = DriveLoop<DriveServer, SimMotor, ManualClock>;

struct Rig {
    addr: SocketAddr,
    client: UdpSocket,
    clock: ManualClock,
    left: SimMotorProbe,
    right: SimMotorProbe,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<(TestLoop, Result<(), DriveLoopError>)>,
}

impl Rig {
    fn start() -> Self {
        let server = DriveServer::new(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_millis(5)
        ).unwrap();
        let addr = server.local_addr().unwrap();

        let left = SimMotor::new("left");
        let right = SimMotor::new("right");
        let (lp, rp) = (left.probe(), right.probe());
        let clock = ManualClock::new();

        let config = LoopConfig {
            watchdog_timeout: Duration::from_secs(10),
            poll_period: Duration::from_millis(1),
            max_consec_transport_errors: 50,
        };

        let mut dl = DriveLoop::new(server, DriveCtrl::new(left, right), clock.clone(), config);

        let shutdown = Arc::new(AtomicBool::new(false));
        let sd = shutdown.clone();
        let handle = thread::spawn(move || {
            let r = dl.run(&sd);
            (dl, r)
        });

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        Rig { addr, client, clock, left: lp, right: rp, shutdown, handle }
    }

    fn send(&self, datagram: &[u8]) {
        self.client.send_to(datagram, self.addr).unwrap();
    }

    fn reply(&self) -> Option<Reply> {
        let mut buf = [0u8; 32];
        match self.client.recv_from(&mut buf) {
            Ok((len, _)) => Reply::parse(&buf[..len]),
            Err(_) => None
        }
    }

    fn duties(&self) -> (i32, i32) {
        (self.left.duty(), self.right.duty())
    }

    /// Wait until the motors reach the given duties, or give up after a second.
    fn wait_for_duties(&self, duties: (i32, i32)) -> (i32, i32) {
        let deadline = Instant::now() + Duration::from_secs(1);
        while self.duties() != duties && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        self.duties()
    }

    fn stop(self) -> TestLoop {
        self.shutdown.store(true, Ordering::Relaxed);
        let (dl, r) = self.handle.join().unwrap();
        r.unwrap();
        dl
    }
}

#[test]
fn forward_at_half_intensity() {
    let rig = Rig::start();

    rig.send(b"F,50");
    assert_eq!(rig.reply(), Some(Reply::Ack));
    assert_eq!(rig.duties(), (512, 512));

    rig.stop();
}

#[test]
fn forward_default_and_backward_clamped() {
    let rig = Rig::start();

    rig.send(b"F");
    assert_eq!(rig.reply(), Some(Reply::Ack));
    assert_eq!(rig.duties(), (716, 716));

    rig.send(b"B,200");
    assert_eq!(rig.reply(), Some(Reply::Ack));
    assert_eq!(rig.duties(), (-1023, -1023));

    rig.stop();
}

#[test]
fn ping_replies_ok_without_moving() {
    let rig = Rig::start();

    rig.send(Command::Backward(Some(Intensity::new(30))).encode().as_bytes());
    assert_eq!(rig.reply(), Some(Reply::Ack));
    let driving = rig.duties();

    rig.send(b"t\n");
    assert_eq!(rig.reply(), Some(Reply::Ok));
    assert_eq!(rig.duties(), driving);

    rig.stop();
}

#[test]
fn invalid_datagram_gets_no_reply() {
    let rig = Rig::start();
    rig.client.set_read_timeout(Some(Duration::from_millis(200))).unwrap();

    rig.send(b"Z,50");
    assert_eq!(rig.reply(), None);

    // The loop is still serving
    rig.send(b"S");
    assert_eq!(rig.reply(), Some(Reply::Ack));

    let dl = rig.stop();
    assert_eq!(dl.stats().num_dropped, 1);
    assert_eq!(dl.stats().num_commands, 1);
}

#[test]
fn watchdog_stops_silent_device() {
    let rig = Rig::start();

    rig.send(b"F,100");
    assert_eq!(rig.reply(), Some(Reply::Ack));
    assert_eq!(rig.duties(), (1023, 1023));

    rig.clock.advance(Duration::from_secs(11));
    assert_eq!(rig.wait_for_duties((0, 0)), (0, 0));

    let dl = rig.stop();
    assert_eq!(dl.stats().num_watchdog_trips, 1);
}

#[test]
fn stop_after_drive_and_shutdown_leaves_motors_stopped() {
    let rig = Rig::start();

    rig.send(b"B,75");
    assert_eq!(rig.reply(), Some(Reply::Ack));
    rig.send(b"S");
    assert_eq!(rig.reply(), Some(Reply::Ack));
    assert_eq!(rig.duties(), (0, 0));

    rig.send(b"F,75");
    assert_eq!(rig.reply(), Some(Reply::Ack));
    assert_ne!(rig.duties(), (0, 0));

    let (left, right) = (rig.left.clone(), rig.right.clone());
    let dl = rig.stop();
    assert!(dl.drive_state().is_stopped());
    assert_eq!((left.duty(), right.duty()), (0, 0));
}
