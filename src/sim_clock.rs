// Simulation Clock - Pausable, speed-scaled simulated time
// Drives the Julian date fed to the propagator; commands arrive as JSON messages

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::{ImpactError, Result};
use crate::orbital_mechanics::datetime_to_julian;

pub type SharedClock = Arc<RwLock<SimulationClock>>;

const MICROS_PER_HOUR: f64 = 3.6e9;

/// Wire names accepted in the `command` field
const COMMAND_NAMES: [&str; 7] = [
    "start",
    "stop",
    "set_speed",
    "set_time",
    "fast_forward",
    "get_state",
    "request_update",
];

// =============================================================================
// CLOCK
// =============================================================================

/// Simulated time = `base_time + (real time since base_real) * speed` while running
#[derive(Debug, Clone)]
pub struct SimulationClock {
    base_time: DateTime<Utc>,
    base_real: Instant,
    is_running: bool,
    time_speed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClockState {
    pub is_running: bool,
    pub time_speed: f64,
    pub current_time: DateTime<Utc>,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl SimulationClock {
    /// A paused clock at `start`, running at 1x once started
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            base_time: start,
            base_real: Instant::now(),
            is_running: false,
            time_speed: 1.0,
        }
    }

    pub fn shared(self) -> SharedClock {
        Arc::new(RwLock::new(self))
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn time_speed(&self) -> f64 {
        self.time_speed
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.current_time_at(Instant::now())
    }

    fn current_time_at(&self, now: Instant) -> DateTime<Utc> {
        if !self.is_running {
            return self.base_time;
        }
        let real_elapsed = now.saturating_duration_since(self.base_real).as_secs_f64();
        let simulated_us = (real_elapsed * self.time_speed * 1e6) as i64;
        self.base_time
            .checked_add_signed(chrono::Duration::microseconds(simulated_us))
            .unwrap_or(self.base_time)
    }

    pub fn julian_date(&self) -> f64 {
        datetime_to_julian(&self.current_time())
    }

    /// Start/resume time flow
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    fn start_at(&mut self, now: Instant) {
        if !self.is_running {
            self.base_time = self.current_time_at(now);
            self.base_real = now;
            self.is_running = true;
            info!("time started");
        }
    }

    /// Pause time flow
    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    fn stop_at(&mut self, now: Instant) {
        if self.is_running {
            self.base_time = self.current_time_at(now);
            self.is_running = false;
            info!("time stopped");
        }
    }

    /// Change the multiplier; negative speeds clamp to zero
    pub fn set_speed(&mut self, speed: f64) {
        self.set_speed_at(speed, Instant::now());
    }

    fn set_speed_at(&mut self, speed: f64, now: Instant) {
        let speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
        self.base_time = self.current_time_at(now);
        self.base_real = now;
        self.time_speed = speed;
        info!(speed, "time speed set");
    }

    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.set_time_at(time, Instant::now());
    }

    fn set_time_at(&mut self, time: DateTime<Utc>, now: Instant) {
        self.base_time = time;
        self.base_real = now;
        info!(%time, "time set");
    }

    /// Jump ahead by `hours`, fractions allowed; negative values rewind
    pub fn fast_forward(&mut self, hours: f64) -> Result<DateTime<Utc>> {
        self.fast_forward_at(hours, Instant::now())
    }

    fn fast_forward_at(&mut self, hours: f64, now: Instant) -> Result<DateTime<Utc>> {
        let micros = (hours * MICROS_PER_HOUR).round();
        let out_of_range = || ImpactError::InvalidDate(format!("fast forward by {hours} hours"));
        if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
            return Err(out_of_range());
        }
        let target = self
            .current_time_at(now)
            .checked_add_signed(chrono::Duration::microseconds(micros as i64))
            .ok_or_else(out_of_range)?;
        self.set_time_at(target, now);
        info!(hours, "fast forwarded");
        Ok(target)
    }

    pub fn snapshot(&self) -> ClockState {
        ClockState {
            is_running: self.is_running,
            time_speed: self.time_speed,
            current_time: self.current_time(),
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    pub fn handle_command(&mut self, command: ClockCommand) -> ClockEvent {
        match command {
            ClockCommand::Start => {
                self.start();
                ClockEvent::success("start", "Time started")
            }
            ClockCommand::Stop => {
                self.stop();
                ClockEvent::success("stop", "Time stopped")
            }
            ClockCommand::SetSpeed { speed } => {
                self.set_speed(speed);
                ClockEvent::command_success(
                    "set_speed",
                    format!("Time speed set to {speed}x"),
                    Some(speed),
                    None,
                    None,
                )
            }
            ClockCommand::SetTime { time } => {
                let Some(text) = time else {
                    return ClockEvent::error("set_time requires a time");
                };
                match parse_clock_time(&text) {
                    Ok(time) => {
                        self.set_time(time);
                        ClockEvent::command_success(
                            "set_time",
                            format!("Time set to {time}"),
                            None,
                            Some(time.to_rfc3339()),
                            None,
                        )
                    }
                    Err(e) => ClockEvent::error(e.to_string()),
                }
            }
            ClockCommand::FastForward { hours } => match self.fast_forward(hours) {
                Ok(_) => ClockEvent::command_success(
                    "fast_forward",
                    format!("Fast forwarded {hours} hours"),
                    None,
                    None,
                    Some(hours),
                ),
                Err(e) => ClockEvent::error(e.to_string()),
            },
            ClockCommand::GetState => ClockEvent::TimeState(self.snapshot()),
            ClockCommand::RequestUpdate => ClockEvent::TimeUpdate(self.snapshot()),
        }
    }

    /// Parse and apply one JSON message such as `{"command": "set_speed", "speed": 60}`
    pub fn handle_message(&mut self, text: &str) -> ClockEvent {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return ClockEvent::error("Invalid JSON"),
        };
        let name = value
            .get("command")
            .and_then(|c| c.as_str())
            .unwrap_or("null")
            .to_string();

        match serde_json::from_value::<ClockCommand>(value) {
            Ok(command) => self.handle_command(command),
            Err(_) if !COMMAND_NAMES.contains(&name.as_str()) => {
                ClockEvent::error(format!("Unknown command: {name}"))
            }
            Err(e) => ClockEvent::error(e.to_string()),
        }
    }
}

/// Accept RFC 3339, or a naive ISO timestamp taken as UTC
pub fn parse_clock_time(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| ImpactError::InvalidDate(format!("{text}: {e}")))
}

// =============================================================================
// MESSAGES
// =============================================================================

fn default_speed() -> f64 {
    1.0
}

fn default_hours() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClockCommand {
    Start,
    Stop,
    SetSpeed {
        #[serde(default = "default_speed")]
        speed: f64,
    },
    SetTime {
        time: Option<String>,
    },
    FastForward {
        #[serde(default = "default_hours")]
        hours: f64,
    },
    GetState,
    RequestUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClockEvent {
    TimeState(ClockState),
    TimeUpdate(ClockState),
    CommandSuccess {
        command: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hours: Option<f64>,
    },
    Error {
        message: String,
    },
}

impl ClockEvent {
    fn command_success(
        command: &str,
        message: String,
        speed: Option<f64>,
        time: Option<String>,
        hours: Option<f64>,
    ) -> ClockEvent {
        ClockEvent::CommandSuccess {
            command: command.to_string(),
            message,
            speed,
            time,
            hours,
        }
    }

    fn success(command: &str, message: &str) -> ClockEvent {
        Self::command_success(command, message.to_string(), None, None, None)
    }

    fn error(message: impl Into<String>) -> ClockEvent {
        ClockEvent::Error {
            message: message.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2029, 4, 13, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_paused_clock_does_not_advance() {
        let clock = SimulationClock::new(epoch());
        let later = Instant::now() + Duration::from_secs(10);
        assert_eq!(clock.current_time_at(later), epoch());
    }

    #[test]
    fn test_running_clock_scales_real_time() {
        let mut clock = SimulationClock::new(epoch());
        let t0 = Instant::now();
        clock.set_speed_at(3600.0, t0);
        clock.start_at(t0);
        let now = t0 + Duration::from_secs(2);
        assert_eq!(
            clock.current_time_at(now),
            epoch() + chrono::Duration::hours(2)
        );

        clock.stop_at(now);
        let much_later = now + Duration::from_secs(100);
        assert_eq!(
            clock.current_time_at(much_later),
            epoch() + chrono::Duration::hours(2)
        );
    }

    #[test]
    fn test_speed_change_rebases() {
        let mut clock = SimulationClock::new(epoch());
        let t0 = Instant::now();
        clock.start_at(t0);
        let t1 = t0 + Duration::from_secs(10);
        clock.set_speed_at(60.0, t1);
        let t2 = t1 + Duration::from_secs(1);
        assert_eq!(
            clock.current_time_at(t2),
            epoch() + chrono::Duration::seconds(70)
        );
    }

    #[test]
    fn test_negative_speed_clamps() {
        let mut clock = SimulationClock::new(epoch());
        clock.set_speed(-5.0);
        assert_eq!(clock.time_speed(), 0.0);
    }

    #[test]
    fn test_fast_forward() {
        let mut clock = SimulationClock::new(epoch());
        let target = clock.fast_forward(48.0).unwrap();
        assert_eq!(target, epoch() + chrono::Duration::hours(48));
        assert_eq!(clock.current_time(), target);
    }

    #[test]
    fn test_fractional_fast_forward() {
        let mut clock = SimulationClock::new(epoch());
        let target = clock.fast_forward(1.5).unwrap();
        assert_eq!(target, epoch() + chrono::Duration::minutes(90));
        assert!(clock.fast_forward(f64::INFINITY).is_err());
        assert!(clock.fast_forward(1e20).is_err());
        assert_eq!(clock.current_time(), target);
    }

    #[test]
    fn test_bad_field_reports_parse_error() {
        let mut clock = SimulationClock::new(epoch());
        match clock.handle_message(r#"{"command": "set_speed", "speed": "fast"}"#) {
            ClockEvent::Error { message } => {
                assert!(message.contains("invalid type"), "{message}");
                assert!(!message.contains("Unknown command"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(clock.time_speed(), 1.0);

        match clock.handle_message(r#"{"command": "fast_forward", "hours": 1.5}"#) {
            ClockEvent::CommandSuccess { hours, .. } => assert_eq!(hours, Some(1.5)),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(clock.current_time(), epoch() + chrono::Duration::minutes(90));
    }

    #[test]
    fn test_julian_date_follows_clock() {
        let clock = SimulationClock::new(Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap());
        assert!((clock.julian_date() - 2451545.0).abs() < 1e-9);
    }

    #[test]
    fn test_messages() {
        let mut clock = SimulationClock::new(epoch());

        match clock.handle_message(r#"{"command": "set_speed", "speed": 10}"#) {
            ClockEvent::CommandSuccess { command, speed, .. } => {
                assert_eq!(command, "set_speed");
                assert_eq!(speed, Some(10.0));
            }
            other => panic!("unexpected: {other:?}"),
        }

        match clock.handle_message(r#"{"command": "set_time", "time": "2030-01-01T00:00:00"}"#) {
            ClockEvent::CommandSuccess { time, .. } => {
                assert_eq!(time.as_deref(), Some("2030-01-01T00:00:00+00:00"))
            }
            other => panic!("unexpected: {other:?}"),
        }

        match clock.handle_message(r#"{"command": "get_state"}"#) {
            ClockEvent::TimeState(state) => {
                assert!(!state.is_running);
                assert_eq!(state.time_speed, 10.0);
            }
            other => panic!("unexpected: {other:?}"),
        }

        assert_eq!(
            clock.handle_message(r#"{"command": "rewind"}"#),
            ClockEvent::Error {
                message: "Unknown command: rewind".to_string()
            }
        );
        assert_eq!(
            clock.handle_message("not json"),
            ClockEvent::Error {
                message: "Invalid JSON".to_string()
            }
        );
    }

    #[test]
    fn test_event_wire_format() {
        let event = ClockEvent::success("start", "Time started");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "command_success");
        assert_eq!(json["command"], "start");
        assert!(json.get("speed").is_none());
    }

    #[test]
    fn test_shared_clock_across_threads() {
        let shared = SimulationClock::new(epoch()).shared();
        let writer = Arc::clone(&shared);
        std::thread::spawn(move || {
            writer.write().fast_forward(1.0).unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(
            shared.read().current_time(),
            epoch() + chrono::Duration::hours(1)
        );
    }
}
