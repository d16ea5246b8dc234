//! Call record lookups linking notes to phone calls.
//!
//! # Invariants
//! - Only `FragmentKind::Call` fragments are consulted.
//! - When several notes match, the oldest fragment wins.

use crate::model::container::ContainerId;
use crate::model::fragment::FragmentKind;
use crate::store::filter::{FragmentFilter, FragmentOrder};
use crate::store::{RecordStore, StoreResult};

pub struct CallRecordService<'s> {
    store: &'s RecordStore,
}

impl<'s> CallRecordService<'s> {
    pub fn new(store: &'s RecordStore) -> Self {
        Self { store }
    }

    /// Phone number recorded on the call fragment of `note_id`.
    pub fn call_number_for_note(&self, note_id: ContainerId) -> StoreResult<Option<String>> {
        let fragments = self.store.query_fragments(
            &FragmentFilter::by_container(note_id).with_kind(FragmentKind::Call),
            FragmentOrder::IdAsc,
        )?;
        Ok(fragments
            .into_iter()
            .next()
            .map(|fragment| fragment.data3))
    }

    /// Note holding the call record for `phone_number` at `call_date`.
    pub fn note_id_for_call(
        &self,
        phone_number: &str,
        call_date: i64,
    ) -> StoreResult<Option<ContainerId>> {
        let fragments = self.store.query_fragments(
            &FragmentFilter::call(phone_number, call_date),
            FragmentOrder::IdAsc,
        )?;
        Ok(fragments
            .first()
            .map(|fragment| fragment.container_id))
    }
}
