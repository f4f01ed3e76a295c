use futures::future::BoxFuture;
use log::debug;
use std::sync::Arc;

pub type Hook = Arc<dyn Fn() + Send + Sync>;
pub type PageHook = Arc<dyn Fn(u32) + Send + Sync>;
pub type AsyncHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Downstream UI hooks. Every member is optional; an absent hook turns the
/// corresponding step into a no-op.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub render_page: Option<Hook>,
    pub go_to_page: Option<PageHook>,
    pub next_page: Option<Hook>,
    pub prev_page: Option<Hook>,
    pub init_paging: Option<Hook>,
    pub init_placeholders: Option<Hook>,
    pub init_update_popup: Option<AsyncHook>,
    pub init_quotes: Option<AsyncHook>,
}

impl Collaborators {
    pub fn with_render_page(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.render_page = Some(Arc::new(hook));
        self
    }

    pub fn with_go_to_page(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.go_to_page = Some(Arc::new(hook));
        self
    }

    pub fn with_next_page(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.next_page = Some(Arc::new(hook));
        self
    }

    pub fn with_prev_page(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.prev_page = Some(Arc::new(hook));
        self
    }

    pub fn with_init_paging(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.init_paging = Some(Arc::new(hook));
        self
    }

    pub fn with_init_placeholders(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.init_placeholders = Some(Arc::new(hook));
        self
    }

    pub fn with_init_update_popup(
        mut self,
        hook: impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        self.init_update_popup = Some(Arc::new(hook));
        self
    }

    pub fn with_init_quotes(
        mut self,
        hook: impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        self.init_quotes = Some(Arc::new(hook));
        self
    }

    /// Names of the hooks that were not provided.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("render_page", self.render_page.is_some()),
            ("go_to_page", self.go_to_page.is_some()),
            ("next_page", self.next_page.is_some()),
            ("prev_page", self.prev_page.is_some()),
            ("init_paging", self.init_paging.is_some()),
            ("init_placeholders", self.init_placeholders.is_some()),
            ("init_update_popup", self.init_update_popup.is_some()),
            ("init_quotes", self.init_quotes.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
    }

    pub fn can_cycle_pages(&self) -> bool {
        self.next_page.is_some() && self.prev_page.is_some()
    }

    pub(crate) fn render_page(&self) {
        call(&self.render_page, "render_page");
    }

    pub(crate) fn go_to_page(&self, page: u32) {
        match &self.go_to_page {
            Some(hook) => hook(page),
            None => debug!("go_to_page collaborator absent; skipping"),
        }
    }

    pub(crate) fn next_page(&self) {
        call(&self.next_page, "next_page");
    }

    pub(crate) fn prev_page(&self) {
        call(&self.prev_page, "prev_page");
    }

    pub(crate) fn init_paging(&self) {
        call(&self.init_paging, "init_paging");
    }

    pub(crate) fn init_placeholders(&self) {
        call(&self.init_placeholders, "init_placeholders");
    }

    pub(crate) async fn init_update_popup(&self) {
        call_async(&self.init_update_popup, "init_update_popup").await;
    }

    pub(crate) async fn init_quotes(&self) {
        call_async(&self.init_quotes, "init_quotes").await;
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("missing", &self.missing())
            .finish()
    }
}

fn call(hook: &Option<Hook>, name: &str) {
    match hook {
        Some(hook) => hook(),
        None => debug!("{name} collaborator absent; skipping"),
    }
}

async fn call_async(hook: &Option<AsyncHook>, name: &str) {
    match hook {
        Some(hook) => hook().await,
        None => debug!("{name} collaborator absent; skipping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn missing_lists_absent_hooks() {
        let collaborators = Collaborators::default()
            .with_render_page(|| {})
            .with_go_to_page(|_| {});
        let missing = collaborators.missing();
        assert!(!missing.contains(&"render_page"));
        assert!(!missing.contains(&"go_to_page"));
        assert!(missing.contains(&"init_quotes"));
        assert_eq!(missing.len(), 6);
        assert!(!collaborators.can_cycle_pages());
    }

    #[tokio::test]
    async fn absent_hooks_are_no_ops() {
        let collaborators = Collaborators::default();
        collaborators.render_page();
        collaborators.go_to_page(1);
        collaborators.init_update_popup().await;
    }

    #[tokio::test]
    async fn present_hooks_run() {
        let calls = Arc::new(AtomicU32::new(0));
        let page = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let target = page.clone();
        let quotes = calls.clone();
        let collaborators = Collaborators::default()
            .with_render_page(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .with_go_to_page(move |n| target.store(n, Ordering::SeqCst))
            .with_init_quotes(move || {
                let quotes = quotes.clone();
                async move {
                    quotes.fetch_add(10, Ordering::SeqCst);
                }
                .boxed()
            });

        collaborators.render_page();
        collaborators.go_to_page(3);
        collaborators.init_quotes().await;
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert_eq!(page.load(Ordering::SeqCst), 3);
    }
}
