//! fleet-ingest: thin typed parsing of the mission manifest JSON.

pub mod mission;

pub use mission::{
    FailureInjection, Mission, MissionConstraints, MissionRotation, RequiredActive,
    parse_mission_file, parse_mission_str,
};
