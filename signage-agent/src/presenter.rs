//! Headless presentation layer.
//!
//! The agent has no screen of its own, so every presentation update is turned
//! into a log line. Counters are kept so shutdown can report what was shown.

use signage_model::{ContentKind, Renderer};
use signage_state::{Directive, PresentationUpdate};
use tracing::{debug, info, warn};

/// Counts of what the session asked the presentation layer to do
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PresentationStats {
    pub renders: u64,
    pub blank_screens: u64,
    pub reloads: u64,
    pub cache_clears: u64,
}

impl PresentationStats {
    pub fn summary(&self) -> String {
        format!(
            "{} renders, {} blank, {} reloads, {} cache clears",
            self.renders, self.blank_screens, self.reloads, self.cache_clears
        )
    }
}

#[derive(Debug, Default)]
pub struct Presenter {
    stats: PresentationStats,
}

impl Presenter {
    pub fn show(&mut self, update: &PresentationUpdate) {
        match update {
            PresentationUpdate::Render { .. } => self.stats.renders += 1,
            PresentationUpdate::NoContent => self.stats.blank_screens += 1,
            PresentationUpdate::Directive(Directive::Reload) => self.stats.reloads += 1,
            PresentationUpdate::Directive(Directive::ClearCache) => self.stats.cache_clears += 1,
            _ => {}
        }

        match update {
            PresentationUpdate::Preload(_) => debug!("{}", describe(update)),
            PresentationUpdate::Directive(_) => warn!("{}", describe(update)),
            _ => info!("{}", describe(update)),
        }
    }

    pub fn stats(&self) -> &PresentationStats {
        &self.stats
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        info!("Presented {}", self.stats.summary());
    }
}

/// One-line description of an update
pub fn describe(update: &PresentationUpdate) -> String {
    match update {
        PresentationUpdate::Render {
            index,
            item,
            renderer,
            transition,
        } => format!(
            "Showing #{} {} via {} for {}s ({:?}, {:.1}s)",
            index,
            locator(&item.content.kind),
            renderer_name(*renderer),
            item.duration,
            transition.kind,
            transition.duration
        ),
        PresentationUpdate::NoContent => "Nothing to show".to_string(),
        PresentationUpdate::Preload(items) => format!("Preloading {} item(s)", items.len()),
        PresentationUpdate::Display(display) => {
            format!("Display {} ({}) updated", display.slug, display.name)
        }
        PresentationUpdate::Connection(status) => format!("Connection {}", status),
        PresentationUpdate::Playback(report) => {
            format!("Playback {:?} at #{}", report.state, report.index)
        }
        PresentationUpdate::Policy(policy) => format!(
            "Device class {:?}, preloading {} ahead",
            policy.class, policy.preload_count
        ),
        PresentationUpdate::Directive(Directive::Reload) => "Reload requested".to_string(),
        PresentationUpdate::Directive(Directive::ClearCache) => {
            "Local cache cleared".to_string()
        }
    }
}

fn locator(kind: &ContentKind) -> String {
    match kind {
        ContentKind::Youtube { video_id } => format!("youtube:{video_id}"),
        other => other.preload_url().unwrap_or_default().to_string(),
    }
}

fn renderer_name(renderer: Renderer) -> &'static str {
    match renderer {
        Renderer::Image => "image",
        Renderer::Video => "video",
        Renderer::Document => "document",
        Renderer::EmbeddedPlayer => "embedded player",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_model::{ContentRef, PlaylistItem, Transition, TransitionKind};

    fn render() -> PresentationUpdate {
        let item = PlaylistItem::new(
            "i1",
            ContentRef::new(
                "c1",
                ContentKind::Youtube {
                    video_id: "abc".to_string(),
                },
            ),
            12,
        );
        PresentationUpdate::Render {
            index: 3,
            item,
            renderer: Renderer::EmbeddedPlayer,
            transition: Transition::new(TransitionKind::Fade, 0.5),
        }
    }

    #[test]
    fn test_describe_render() {
        assert_eq!(
            describe(&render()),
            "Showing #3 youtube:abc via embedded player for 12s (Fade, 0.5s)"
        );
    }

    #[test]
    fn test_stats_counting() {
        let mut presenter = Presenter::default();
        presenter.show(&render());
        presenter.show(&PresentationUpdate::NoContent);
        presenter.show(&PresentationUpdate::Directive(Directive::Reload));
        presenter.show(&PresentationUpdate::Directive(Directive::Reload));

        let stats = presenter.stats();
        assert_eq!(stats.renders, 1);
        assert_eq!(stats.blank_screens, 1);
        assert_eq!(stats.reloads, 2);
        assert_eq!(stats.cache_clears, 0);
        assert_eq!(stats.summary(), "1 renders, 1 blank, 2 reloads, 0 cache clears");
    }
}
