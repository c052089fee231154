//! Alert reports built from detected change regions.
//!
//! Text generation and delivery are collaborators behind traits; this module
//! only composes the report.

use tracing::{debug, info};

use crate::error::Result;
use crate::geometric::features::ChangeFeatureCollection;

pub const ALERT_SUBJECT: &str = "Environmental Watchdog Alert: Deforestation Analysis Results";

/// Produces narrative text for a set of change regions
pub trait NarrativeGenerator {
    /// `None` when no narrative is available
    fn narrate(&self, features: &ChangeFeatureCollection) -> Result<Option<String>>;
}

/// Delivers a composed report (mail relay, webhook, ...)
pub trait ReportTransport {
    fn deliver(&self, recipient: &str, report: &AlertReport) -> Result<()>;
}

/// Generator that never produces text
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNarrative;

impl NarrativeGenerator for NoNarrative {
    fn narrate(&self, _features: &ChangeFeatureCollection) -> Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertReport {
    pub subject: String,
    /// Plaintext alternative
    pub text_body: String,
    pub html_body: String,
    /// Feature centroids as (lat, lon)
    pub locations: Vec<(f64, f64)>,
}

/// Report listing every feature's centroid, with the optional narrative
/// ahead of the list
pub fn compose_alert(features: &ChangeFeatureCollection, narrative: Option<&str>) -> AlertReport {
    let locations: Vec<(f64, f64)> = features
        .features
        .iter()
        .filter_map(|f| f.centroid())
        .map(|p| (p.y(), p.x()))
        .collect();

    let summary = match locations.len() {
        0 => "No suspected deforestation was detected in the monitored area.".to_string(),
        1 => "Suspected deforestation was detected at 1 location.".to_string(),
        n => format!("Suspected deforestation was detected at {} locations.", n),
    };

    let mut text = String::new();
    let mut html = String::from("<html>\n<body style=\"font-family: Arial, sans-serif;\">\n");
    if let Some(narrative) = narrative {
        text.push_str(narrative.trim());
        text.push_str("\n\n");
        for paragraph in narrative.split("\n\n").filter(|p| !p.trim().is_empty()) {
            html.push_str(&format!("<p>{}</p>\n", escape_html(paragraph.trim())));
        }
    }
    text.push_str(&summary);
    text.push('\n');
    html.push_str(&format!("<p>{}</p>\n", escape_html(&summary)));

    if !locations.is_empty() {
        text.push_str("\nCoordinates (lat, lon):\n");
        html.push_str("<h3>Coordinates</h3>\n<ul>\n");
        for (lat, lon) in &locations {
            text.push_str(&format!("  - {:.4}, {:.4}\n", lat, lon));
            html.push_str(&format!("  <li>{:.4}, {:.4}</li>\n", lat, lon));
        }
        html.push_str("</ul>\n");
        let verify =
            "Please verify these coordinates as they may indicate suspected deforestation.";
        text.push_str(&format!("\n{}\n", verify));
        html.push_str(&format!("<p>{}</p>\n", verify));
    }
    html.push_str("</body>\n</html>\n");

    AlertReport {
        subject: ALERT_SUBJECT.to_string(),
        text_body: text,
        html_body: html,
        locations,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Narrates, composes and delivers alerts to one recipient
pub struct Notifier<G: NarrativeGenerator, T: ReportTransport> {
    generator: G,
    transport: T,
    recipient: String,
}

impl<G: NarrativeGenerator, T: ReportTransport> Notifier<G, T> {
    pub fn new(generator: G, transport: T, recipient: impl Into<String>) -> Self {
        Notifier {
            generator,
            transport,
            recipient: recipient.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Compose and deliver a report; returns what was sent
    pub fn notify(&self, features: &ChangeFeatureCollection) -> Result<AlertReport> {
        let narrative = self.generator.narrate(features)?;
        debug!(narrative = narrative.is_some(), "composing alert");
        let report = compose_alert(features, narrative.as_deref());
        self.transport.deliver(&self.recipient, &report)?;
        info!(
            recipient = %self.recipient,
            locations = report.locations.len(),
            "alert delivered"
        );
        Ok(report)
    }
}
