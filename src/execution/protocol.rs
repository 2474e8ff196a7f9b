//! Line-delimited JSON messages exchanged with the worker.
//!
//! Every request carries an id; the worker echoes it on the reply. Both
//! sides write one JSON object per line.

use serde::{Deserialize, Serialize};

use super::OutputChunk;

/// Operation requested from the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    TryCompile {
        line_offset: usize,
        filename: String,
        source: String,
    },
    Evaluate,
    Execute,
    ExecuteSource {
        line_offset: usize,
        filename: String,
        source: String,
    },
    SetWorkingDir {
        path: String,
    },
    Flush,
    Shutdown,
}

impl Request {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::TryCompile { .. } => "try_compile",
            Request::Evaluate => "evaluate",
            Request::Execute => "execute",
            Request::ExecuteSource { .. } => "execute_source",
            Request::SetWorkingDir { .. } => "set_working_dir",
            Request::Flush => "flush",
            Request::Shutdown => "shutdown",
        }
    }
}

/// Worker answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Compiled {
        is_value: bool,
    },
    Incomplete,
    SyntaxError {
        output: Vec<OutputChunk>,
    },
    Evaluated {
        repr: Option<String>,
        #[serde(default)]
        output: Vec<OutputChunk>,
    },
    Executed {
        #[serde(default)]
        output: Vec<OutputChunk>,
    },
    Raised {
        output: Vec<OutputChunk>,
    },
    Flushed {
        output: Vec<OutputChunk>,
    },
    Ack,
    Failed {
        message: String,
    },
}

/// A message tagged with the id that pairs requests with replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Envelope<T> {
    /// Encode as a single line, newline included.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let envelope = Envelope {
            id: 7,
            body: Request::TryCompile {
                line_offset: 3,
                filename: "demo.py".into(),
                source: "x = 1".into(),
            },
        };
        let line = envelope.to_line().unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["op"], "try_compile");
        assert_eq!(value["line_offset"], 3);

        let unit = Envelope { id: 1, body: Request::Flush }.to_line().unwrap();
        assert_eq!(unit.trim_end(), r#"{"id":1,"op":"flush"}"#);
    }

    #[test]
    fn replies_parse_from_worker_lines() {
        let reply: Envelope<Reply> =
            serde_json::from_str(r#"{"kind": "compiled", "is_value": true, "id": 4}"#).unwrap();
        assert_eq!(reply.id, 4);
        assert_eq!(reply.body, Reply::Compiled { is_value: true });

        let reply: Envelope<Reply> = serde_json::from_str(
            r#"{"id": 5, "kind": "evaluated", "repr": null, "output": [{"stream": "stdout", "text": "hi\n"}]}"#,
        )
        .unwrap();
        assert_eq!(
            reply.body,
            Reply::Evaluated {
                repr: None,
                output: vec![OutputChunk::stdout("hi\n")]
            }
        );

        let reply: Envelope<Reply> = serde_json::from_str(r#"{"id": 6, "kind": "incomplete"}"#).unwrap();
        assert_eq!(reply.body, Reply::Incomplete);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<Envelope<Reply>>(r#"{"id": 1, "kind": "teapot"}"#).is_err());
    }
}
