use crate::case::model::Step;
use chrono::{DateTime, Local};

const STEP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collects the steps of one executing case.
#[derive(Debug, Default, Clone)]
pub struct StepLogger {
    steps: Vec<Step>,
}

impl StepLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, action: impl Into<String>, expected: impl Into<String>) {
        self.record(Step::new(action, expected, "Passed"));
    }

    pub fn add_step_with_outcome(
        &mut self,
        action: impl Into<String>,
        expected: impl Into<String>,
        outcome: impl Into<String>,
    ) {
        self.record(Step::new(action, expected, outcome));
    }

    pub fn fail_step(&mut self, action: impl Into<String>, expected: impl Into<String>, error: &str) {
        self.record(Step::new(action, expected, format!("Failed: {}", error)));
    }

    fn record(&mut self, mut step: Step) {
        step.timestamp = Some(Local::now().format(STEP_TIME_FORMAT).to_string());
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    pub fn reset(&mut self) {
        self.steps.clear();
    }
}

/// Renders steps into the XML fragment stored on a result's iteration.
pub fn render_steps_xml(steps: &[Step]) -> String {
    let mut xml = String::from("<steps id='0'>");
    for (index, step) in steps.iter().enumerate() {
        xml.push_str(&format!(
            "<step id='{}' type='ActionStep'>\
             <parameterizedString isformatted='true'>{}</parameterizedString>\
             <parameterizedString isformatted='true'>{}</parameterizedString>\
             <outcome>{}</outcome>\
             </step>",
            index + 1,
            escape_xml(&step.action),
            escape_xml(&step.expected),
            escape_xml(&step.outcome),
        ));
    }
    xml.push_str("</steps>");
    xml
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Produces the downloadable step log attached to a result.
pub trait StepLogRenderer: Send + Sync {
    fn file_name(&self, now: DateTime<Local>) -> String;

    fn render(&self, steps: &[Step], now: DateTime<Local>) -> Vec<u8>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextStepLog;

impl StepLogRenderer for TextStepLog {
    fn file_name(&self, now: DateTime<Local>) -> String {
        format!("test_steps_{}.txt", now.format("%Y%m%d_%H%M%S"))
    }

    fn render(&self, steps: &[Step], now: DateTime<Local>) -> Vec<u8> {
        let fallback = now.format(STEP_TIME_FORMAT).to_string();
        let mut text = String::from("Test Execution Steps\n====================\n");
        for (index, step) in steps.iter().enumerate() {
            text.push_str(&format!("Step {}: {}\n", index + 1, step.action));
            text.push_str(&format!("Expected: {}\n", step.expected));
            text.push_str(&format!("Result: {}\n", step.outcome));
            text.push_str(&format!(
                "Timestamp: {}\n",
                step.timestamp.as_deref().unwrap_or(&fallback)
            ));
            text.push_str("--------------------\n");
        }
        text.into_bytes()
    }
}
