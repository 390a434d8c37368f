//! Table-of-contents tracker: maps scroll position to the active section.

use crate::Effect;

/// Distance from the viewport top, in pixels, a section must cross to become active.
pub const DEFAULT_SCROLL_OFFSET: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocSection {
    pub id: String,
    pub title: String,
    pub subsections: Vec<TocSection>,
}

impl TocSection {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subsections: Vec::new(),
        }
    }
}

/// Measured top edge of a section element, relative to the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionTop {
    pub id: String,
    pub top: f64,
}

impl SectionTop {
    pub fn new(id: impl Into<String>, top: f64) -> Self {
        Self { id: id.into(), top }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TocMsg {
    /// The report view was mounted; scroll listeners may be attached.
    Mounted,
    /// The report view is being torn down.
    Unmounted,
    Scrolled,
    Resized,
    /// The host granted the requested animation frame and measured section tops.
    AnimationFrame { tops: Vec<SectionTop> },
    /// A TOC entry was clicked. `document_top` is the target's absolute top, if mounted.
    NavClicked {
        section_id: String,
        document_top: Option<f64>,
    },
    /// The smooth scroll started by a navigation click has finished.
    ScrollSettled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TocTracker {
    sections: Vec<TocSection>,
    ids: Vec<String>,
    active: Option<String>,
    offset: f64,
    mounted: bool,
    listening: bool,
    frame_pending: bool,
    navigating_to: Option<String>,
    dirty: bool,
}

impl Default for TocTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_OFFSET)
    }
}

impl TocTracker {
    pub fn new(offset: f64) -> Self {
        Self {
            sections: Vec::new(),
            ids: Vec::new(),
            active: None,
            offset,
            mounted: false,
            listening: false,
            frame_pending: false,
            navigating_to: None,
            dirty: false,
        }
    }

    pub fn sections(&self) -> &[TocSection] {
        &self.sections
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating_to.is_some()
    }

    pub(crate) fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Replaces the section list; the first declared section becomes active.
    pub fn set_sections(&mut self, sections: Vec<TocSection>) -> Vec<Effect> {
        let mut ids = Vec::new();
        flatten_ids(&sections, &mut ids);
        self.sections = sections;
        self.ids = ids;
        self.navigating_to = None;
        self.dirty = true;

        let mut effects = Vec::new();
        let first = self.ids.first().cloned();
        if let Some(effect) = self.set_active(first) {
            effects.push(effect);
        }
        effects.extend(self.sync_listener());
        effects
    }

    pub fn update(&mut self, msg: TocMsg) -> Vec<Effect> {
        match msg {
            TocMsg::Mounted => {
                self.mounted = true;
                self.sync_listener()
            }
            TocMsg::Unmounted => {
                self.mounted = false;
                self.sync_listener()
            }
            TocMsg::Scrolled | TocMsg::Resized => self.request_frame().into_iter().collect(),
            TocMsg::AnimationFrame { tops } => {
                self.frame_pending = false;
                if !self.listening || self.navigating_to.is_some() {
                    return Vec::new();
                }
                let next = self.compute_active(&tops);
                self.set_active(next).into_iter().collect()
            }
            TocMsg::NavClicked {
                section_id,
                document_top,
            } => {
                if !self.ids.iter().any(|id| *id == section_id) {
                    return Vec::new();
                }
                let mut effects: Vec<Effect> =
                    self.set_active(Some(section_id.clone())).into_iter().collect();
                if let Some(top) = document_top {
                    self.navigating_to = Some(section_id.clone());
                    effects.push(Effect::SmoothScrollTo {
                        section_id,
                        top: (top - self.offset).max(0.0),
                    });
                }
                effects
            }
            TocMsg::ScrollSettled => {
                if self.navigating_to.take().is_some() {
                    self.request_frame().into_iter().collect()
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn sync_listener(&mut self) -> Vec<Effect> {
        let should_listen = self.mounted && !self.ids.is_empty();
        if should_listen == self.listening {
            return Vec::new();
        }
        self.listening = should_listen;
        self.frame_pending = false;
        if should_listen {
            let mut effects = vec![Effect::AttachScrollListener];
            effects.extend(self.request_frame());
            effects
        } else {
            self.navigating_to = None;
            vec![Effect::DetachScrollListener]
        }
    }

    /// At most one frame is outstanding; extra scroll events coalesce into it.
    fn request_frame(&mut self) -> Option<Effect> {
        if !self.listening || self.frame_pending {
            return None;
        }
        self.frame_pending = true;
        Some(Effect::RequestAnimationFrame)
    }

    /// Last-crossed wins: the lowest section whose top is above the offset line.
    fn compute_active(&self, tops: &[SectionTop]) -> Option<String> {
        let crossed = tops
            .iter()
            .filter(|measured| self.ids.iter().any(|id| *id == measured.id))
            .filter(|measured| measured.top <= self.offset)
            .fold(None::<&SectionTop>, |best, measured| match best {
                Some(current) if current.top > measured.top => Some(current),
                _ => Some(measured),
            });

        crossed
            .map(|measured| measured.id.clone())
            .or_else(|| self.ids.first().cloned())
    }

    fn set_active(&mut self, next: Option<String>) -> Option<Effect> {
        if self.active == next {
            return None;
        }
        self.active = next.clone();
        self.dirty = true;
        next.map(|section_id| Effect::ActiveSectionChanged { section_id })
    }
}

fn flatten_ids(sections: &[TocSection], out: &mut Vec<String>) {
    for section in sections {
        out.push(section.id.clone());
        flatten_ids(&section.subsections, out);
    }
}
