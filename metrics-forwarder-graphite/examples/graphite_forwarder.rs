use std::{thread, time::Duration, time::SystemTime};

use metrics_forwarder_graphite::GraphiteBuilder;

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let client = GraphiteBuilder::default()
        .with_remote_address("127.0.0.1:2003")
        .expect("failed to parse remote address")
        .with_debug(true)
        .build();

    client.start().expect("failed to start forwarder");

    // Pretend to do some work, reporting how many iterations we've done so far.
    for i in 0..10 {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        client.send(format!("demo.loop.iterations {} {}\n", i, now));
        thread::sleep(Duration::from_millis(500));
    }

    client.stop();
}
