//! Page navigation bookkeeping with stale-render protection.
//!
//! Rendering a page is asynchronous. Every request takes a [`RenderTicket`]
//! stamped with a fresh epoch; only the ticket from the latest request may
//! commit, so a slow render for an old page can never overwrite a newer one.

/// Handle for one in-flight page render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    pub page: u32,
    pub epoch: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PageSynchronizer {
    current_page: u32,
    page_count: u32,
    epoch: u64,
}

impl PageSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a freshly opened document.
    pub fn reset(&mut self, page_count: u32) {
        self.page_count = page_count;
        self.current_page = 0;
        self.epoch += 1;
    }

    /// Page whose render last committed, 1-based. 0 before the first render.
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn contains(&self, page: u32) -> bool {
        (1..=self.page_count).contains(&page)
    }

    /// Start a render of `page`. Out-of-range pages yield `None`.
    pub fn begin(&mut self, page: u32) -> Option<RenderTicket> {
        if !self.contains(page) {
            log::debug!("Ignoring render of page {} (document has {})", page, self.page_count);
            return None;
        }
        self.epoch += 1;
        Some(RenderTicket {
            page,
            epoch: self.epoch,
        })
    }

    /// Whether `ticket` is still the latest request.
    pub fn is_current(&self, ticket: RenderTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Commit a finished render. Stale tickets are dropped and return false.
    pub fn complete(&mut self, ticket: RenderTicket) -> bool {
        if !self.is_current(ticket) {
            log::debug!(
                "Dropping stale render of page {} (epoch {} < {})",
                ticket.page,
                ticket.epoch,
                self.epoch
            );
            return false;
        }
        self.current_page = ticket.page;
        true
    }

    /// Invalidate any in-flight render without starting a new one.
    pub fn cancel(&mut self) {
        self.epoch += 1;
    }

    pub fn prev_page(&self) -> Option<u32> {
        let page = self.current_page.checked_sub(1)?;
        self.contains(page).then_some(page)
    }

    pub fn next_page(&self) -> Option<u32> {
        let page = self.current_page + 1;
        self.contains(page).then_some(page)
    }

    /// Parse a page number typed by the user. Junk and out-of-range input
    /// yield `None`.
    pub fn parse_page_input(&self, input: &str) -> Option<u32> {
        let page = input.trim().parse::<u32>().ok()?;
        self.contains(page).then_some(page)
    }
}
