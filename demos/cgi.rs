//! A CGI program echoing what it received.
//!
//! ```
//! cargo build --example cgi
//! CONTENT_TYPE="multipart/form-data; boundary=AaB03x" CONTENT_LENGTH=220 \
//!     RUST_LOG=debug target/debug/examples/cgi < tests/fixtures/rfc1867-example.txt
//! ```

use std::io::{self, Write};

use anyhow::Result;
use cgi_form::{CgiEnv, Config, FormData, Session, SessionValue};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        // From env var: `RUST_LOG`
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    let env = CgiEnv::from_env();
    let config = Config::default();

    let mut ingested = FormData::new(config.clone()).ingest(&env, io::stdin().lock())?;

    let mut session = Session::new(&config);
    if !session.start(env.cookie()) {
        session.create();
    }

    let mut record = session.get_data().unwrap_or_default();
    let visits = match record.get("visits") {
        Some(SessionValue::Number(n)) => n + 1.0,
        _ => 1.0,
    };
    record.insert("visits", visits);
    session.set_data(&record);

    let mut out = io::stdout().lock();

    out.write_all(b"Content-Type: text/plain\r\n")?;
    if let Some(id) = session.id() {
        write!(out, "Set-Cookie: {}={}\r\n", config.cookie_name, id)?;
    }
    out.write_all(b"\r\n")?;

    if let Some(posted) = ingested.take_posted() {
        out.write_all(b"post ")?;
        out.write_all(&posted)?;
        out.write_all(b"\n")?;
    }
    if let Some(files) = ingested.take_files() {
        writeln!(out, "files {}", files)?;
    }
    writeln!(out, "visits {}", visits)?;

    out.flush()?;

    Ok(())
}
