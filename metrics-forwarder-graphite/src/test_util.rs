use std::{
    collections::VecDeque,
    io::{self, Write},
    net::SocketAddr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    forwarder::{Connect, ConnectError},
    settings::Endpoint,
};

/// What the next write on a scripted stream should do.
#[derive(Clone, Copy, Debug)]
pub enum WriteResult {
    Full,
    Short(usize),
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct Script {
    connect_results: VecDeque<bool>,
    panic_on_connect: bool,
    write_results: VecDeque<WriteResult>,
    connects: usize,
    closed: usize,
    written: Vec<(usize, Vec<u8>)>,
}

/// In-memory connector whose connection and write results are scripted ahead of time.
///
/// Anything not scripted succeeds. Every successful write is recorded along with the number of the connection it went
/// out on, starting from 1.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn refuse_next_connects(&self, count: usize) {
        self.script.lock().connect_results.extend(std::iter::repeat(false).take(count));
    }

    /// Makes the next connection attempt panic, as a faulty custom connector might.
    pub fn panic_on_next_connect(&self) {
        self.script.lock().panic_on_connect = true;
    }

    pub fn push_write_results<I>(&self, results: I)
    where
        I: IntoIterator<Item = WriteResult>,
    {
        self.script.lock().write_results.extend(results);
    }

    pub fn connects(&self) -> usize {
        self.script.lock().connects
    }

    pub fn closed(&self) -> usize {
        self.script.lock().closed
    }

    pub fn written(&self) -> Vec<(usize, Vec<u8>)> {
        self.script.lock().written.clone()
    }

    pub fn written_messages(&self) -> Vec<Vec<u8>> {
        self.script.lock().written.iter().map(|(_, msg)| msg.clone()).collect()
    }
}

impl Connect for ScriptedConnector {
    type Stream = ScriptedStream;

    fn connect(&self, _: &Endpoint) -> Result<ScriptedStream, ConnectError> {
        let mut script = self.script.lock();
        script.connects += 1;
        if std::mem::take(&mut script.panic_on_connect) {
            drop(script);
            panic!("scripted connector panicked");
        }
        if script.connect_results.pop_front().unwrap_or(true) {
            Ok(ScriptedStream { connector: self.clone(), id: script.connects })
        } else {
            Err(ConnectError::Connect {
                addr: SocketAddr::from(([127, 0, 0, 1], 2003)),
                source: io::ErrorKind::ConnectionRefused.into(),
            })
        }
    }
}

pub struct ScriptedStream {
    connector: ScriptedConnector,
    id: usize,
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut script = self.connector.script.lock();
        match script.write_results.pop_front().unwrap_or(WriteResult::Full) {
            WriteResult::Full => {
                script.written.push((self.id, buf.to_vec()));
                Ok(buf.len())
            }
            WriteResult::Short(n) => Ok(n),
            WriteResult::Fail(kind) => Err(kind.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.connector.script.lock().closed += 1;
    }
}

/// Polls `condition` until it holds, panicking if it doesn't within a few seconds.
pub fn wait_for<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met before deadline");
        thread::sleep(Duration::from_millis(5));
    }
}
