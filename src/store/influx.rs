//! Tagged time-series append over the InfluxDB v2 line protocol.
//!
//! One point per record: measurement = sensor name, tag = owning entity,
//! fields = per-signal columns, timestamp = frame time in nanoseconds.

use std::collections::VecDeque;
use std::fmt::Write as _;

use crate::{config::SensorConfig, error::PersistError, pipeline::Record, store::Destination};

pub struct InfluxLineDestination {
    write_url: String,
    token: String,
    measurement: String,
    tag: String,
    field_names: Vec<String>,
    agent: ureq::Agent,
}

fn escape(part: &str) -> String {
    part.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

impl InfluxLineDestination {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url: String,
        org: String,
        bucket: String,
        token: String,
        config: &SensorConfig,
        owner: String,
        input_names: Vec<String>,
        output_names: Vec<String>,
    ) -> Self {
        let write_url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ns",
            url.trim_end_matches('/'),
            org,
            bucket
        );
        let measurement = escape(if config.description.is_empty() {
            &config.name
        } else {
            &config.description
        });
        let tag = format!("owner={},sensor=sensor_{}", escape(&owner), config.id);

        let mut field_names = input_names;
        field_names.extend(output_names);
        let field_names = field_names.iter().map(|n| escape(n)).collect();

        Self {
            write_url,
            token,
            measurement,
            tag,
            field_names,
            agent: ureq::Agent::new(),
        }
    }

    fn line(&self, record: &Record) -> String {
        let mut line = format!("{},{} ", self.measurement, self.tag);
        for (i, (name, value)) in self
            .field_names
            .iter()
            .zip(record.inputs.iter().chain(record.outputs.iter()))
            .enumerate()
        {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(line, "{}={}", name, value);
        }
        let ns = record.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let _ = write!(line, " {}", ns);
        line
    }
}

impl Destination for InfluxLineDestination {
    fn persist(
        &mut self,
        latest: &Record,
        _history: &VecDeque<Record>,
    ) -> Result<(), PersistError> {
        let line = self.line(latest);
        match self
            .agent
            .post(&self.write_url)
            .set("Authorization", &format!("Token {}", self.token))
            .set("Content-Type", "text/plain; charset=utf-8")
            .send_string(&line)
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, _)) => Err(PersistError::Http { status }),
            Err(e) => Err(PersistError::Transport(e.to_string())),
        }
    }
}
