//! Shared state of one engine pass.

use chrono::NaiveDateTime;

use crate::config::GanttSettings;
use crate::dates::DateService;
use crate::models::UniqueId;
use crate::store::TaskStore;

/// Borrowed view of the editor handed to every engine component.
///
/// `touched` lists, in first-touch order, the records whose schedule an
/// engine component changed directly; the editor uses it to fan changes
/// out to resource-view clones and to roll ancestors up.
pub struct EditContext<'a> {
    pub store: &'a mut TaskStore,
    pub settings: &'a GanttSettings,
    pub dates: &'a dyn DateService,
    /// Timeline origin for taskbar geometry.
    pub origin: NaiveDateTime,
    pub touched: Vec<UniqueId>,
}

impl<'a> EditContext<'a> {
    pub fn new(
        store: &'a mut TaskStore,
        settings: &'a GanttSettings,
        dates: &'a dyn DateService,
        origin: NaiveDateTime,
    ) -> Self {
        Self {
            store,
            settings,
            dates,
            origin,
            touched: Vec::new(),
        }
    }

    /// Records that `uid` was changed by this pass.
    pub fn touch(&mut self, uid: UniqueId) {
        if !self.touched.contains(&uid) {
            self.touched.push(uid);
        }
    }
}
