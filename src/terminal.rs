use crate::{
    collaborators::Collaborators,
    model::CardMarker,
    progress::LoadingIndicator,
    surface::{MemorySurface, RenderedCard},
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::{
    fmt::Write as _,
    io::{self, Write},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};

/// Loading bar on stderr. A fresh bar is drawn for every load cycle.
pub struct TerminalIndicator {
    bar: Mutex<Option<ProgressBar>>,
    visible: bool,
}

impl TerminalIndicator {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            visible: true,
        }
    }

    pub fn hidden() -> Self {
        Self {
            bar: Mutex::new(None),
            visible: false,
        }
    }

    fn with_bar(&self, apply: impl FnOnce(&ProgressBar)) {
        let mut slot = self.bar.lock().expect("indicator poisoned");
        let bar = slot.get_or_insert_with(|| self.spawn_bar());
        apply(bar);
    }

    fn spawn_bar(&self) -> ProgressBar {
        let target = if self.visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(100), target);
        bar.set_style(loading_style());
        bar
    }

    fn take(&self) -> Option<ProgressBar> {
        self.bar.lock().expect("indicator poisoned").take()
    }
}

impl Default for TerminalIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingIndicator for TerminalIndicator {
    fn progress(&self, percent: u8, completed: usize, total: usize) {
        self.with_bar(|bar| {
            bar.set_position(u64::from(percent));
            bar.set_message(format!("({completed}/{total})"));
        });
    }

    fn dismiss(&self) {
        if let Some(bar) = self.take() {
            bar.finish_and_clear();
        }
    }

    fn failure(&self, message: &str) {
        let bar = self.take().unwrap_or_else(|| self.spawn_bar());
        bar.abandon_with_message(message.to_string());
    }
}

fn loading_style() -> ProgressStyle {
    ProgressStyle::with_template("Loading assets [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Shows one page of the grid at a time, grouping cards by their page field.
#[derive(Debug)]
pub struct TerminalPager {
    surface: Arc<MemorySurface>,
    page: AtomicU32,
}

impl TerminalPager {
    pub fn new(surface: Arc<MemorySurface>) -> Self {
        Self {
            surface,
            page: AtomicU32::new(1),
        }
    }

    pub fn current_page(&self) -> u32 {
        self.page.load(Ordering::SeqCst)
    }

    pub fn set_page(&self, page: u32) -> bool {
        let clamped = page.clamp(1, self.surface.page_count());
        self.page.swap(clamped, Ordering::SeqCst) != clamped
    }

    pub fn step(&self, forward: bool) {
        let current = self.current_page();
        let target = if forward {
            current.saturating_add(1)
        } else {
            current.saturating_sub(1)
        };
        self.set_page(target);
    }

    pub fn render(&self) -> String {
        let page = self.current_page();
        let cards = self.surface.snapshot();
        let mut out = format!("Page {page}/{}\n", self.surface.page_count());
        let on_page: Vec<&RenderedCard> = cards.iter().filter(|card| card.page == page).collect();
        if on_page.is_empty() {
            out.push_str("  (no assets)\n");
        }
        for card in on_page {
            out.push_str(&format_card(card));
        }
        out
    }

    pub fn print(&self) {
        let _ = io::stdout().write_all(self.render().as_bytes());
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        let render = self.clone();
        let go_to = self.clone();
        let next = self.clone();
        let prev = self.clone();
        let init = self.clone();
        Collaborators::default()
            .with_render_page(move || render.print())
            .with_go_to_page(move |page| {
                if go_to.set_page(page) {
                    go_to.print();
                }
            })
            .with_next_page(move || next.step(true))
            .with_prev_page(move || prev.step(false))
            .with_init_paging(move || {
                init.page.store(1, Ordering::SeqCst);
            })
    }
}

fn format_card(card: &RenderedCard) -> String {
    let mut line = String::new();
    let star = if card.favorite { '*' } else { ' ' };
    let _ = write!(line, "  [{star}] {}", display_title(card));
    if !card.author.is_empty() {
        let _ = write!(line, " by {}", card.author);
    }
    for badge in &card.badges {
        let _ = write!(line, " <{}>", badge.label());
    }
    if card.markers.contains(&CardMarker::Soon) {
        line.push_str(" (coming soon)");
    }
    line.push('\n');
    let image = card.image.as_deref().unwrap_or("loading...");
    let _ = writeln!(line, "      image: {image}");
    let _ = writeln!(line, "      link:  {}", card.link);
    line
}

fn display_title(card: &RenderedCard) -> &str {
    if card.title.is_empty() {
        "(untitled)"
    } else {
        &card.title
    }
}
