// src/topic.rs
//
// Topic naming around a table entry:
//   <topic>        command (plain)
//   <topic>/cmd    command
//   <topic>/state  state published by the bridge, never consumed

use std::fmt;

use crate::table::{ConversionTable, Entry};

pub const CMD_SUFFIX: &str = "/cmd";
pub const STATE_SUFFIX: &str = "/state";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicKind {
    Base,
    Cmd,
    State,
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TopicKind::Base => "BASE",
            TopicKind::Cmd => "CMD",
            TopicKind::State => "STATE",
        };
        f.write_str(s)
    }
}

pub fn classify(topic: &str) -> TopicKind {
    if topic.ends_with(STATE_SUFFIX) {
        TopicKind::State
    } else if topic.ends_with(CMD_SUFFIX) {
        TopicKind::Cmd
    } else {
        TopicKind::Base
    }
}

pub fn state_topic(base: &str) -> String {
    format!("{}{}", base, STATE_SUFFIX)
}

pub fn command_topic(base: &str) -> String {
    format!("{}{}", base, CMD_SUFFIX)
}

/// Entry addressed by an incoming command topic. State topics never resolve.
pub fn resolve_command<'t>(table: &'t ConversionTable, topic: &str) -> Option<&'t Entry> {
    match classify(topic) {
        TopicKind::State => None,
        TopicKind::Cmd => topic
            .strip_suffix(CMD_SUFFIX)
            .and_then(|base| table.find_by_topic(base)),
        TopicKind::Base => table.find_by_topic(topic),
    }
}
