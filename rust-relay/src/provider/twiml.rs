//! Call control document (TwiML) builder.

use std::fmt::Write as _;

/// One instruction in a control document.
#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    /// Speak text with the given voice
    Say { text: String, voice: String },
    /// Wait, optionally for a number of seconds
    Pause { length: Option<u32> },
    /// Record the caller and report to `action`
    Record(RecordOptions),
}

/// Attributes of a `<Record>` verb.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOptions {
    pub action: String,
    pub timeout: u64,
    pub max_length: u64,
    pub play_beep: bool,
    pub method: String,
}

/// A `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>, voice: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say {
            text: text.into(),
            voice: voice.into(),
        });
        self
    }

    pub fn pause(mut self, length: Option<u32>) -> Self {
        self.verbs.push(Verb::Pause { length });
        self
    }

    pub fn record(mut self, options: RecordOptions) -> Self {
        self.verbs.push(Verb::Record(options));
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Render the document as XML.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>");

        for verb in &self.verbs {
            match verb {
                Verb::Say { text, voice } => {
                    let _ = write!(xml, "<Say voice=\"{}\">{}</Say>", escape(voice), escape(text));
                }
                Verb::Pause { length: Some(secs) } => {
                    let _ = write!(xml, "<Pause length=\"{}\"/>", secs);
                }
                Verb::Pause { length: None } => xml.push_str("<Pause/>"),
                Verb::Record(opts) => {
                    let _ = write!(
                        xml,
                        "<Record action=\"{}\" timeout=\"{}\" maxLength=\"{}\" playBeep=\"{}\" method=\"{}\"/>",
                        escape(&opts.action),
                        opts.timeout,
                        opts.max_length,
                        opts.play_beep,
                        escape(&opts.method)
                    );
                }
            }
        }

        xml.push_str("</Response>\n");
        xml
    }
}

/// Escape text for use in XML content and attribute values.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
