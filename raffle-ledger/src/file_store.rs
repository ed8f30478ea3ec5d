use std::{
    fs,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;

use crate::{
    raffle::{RaffleConfig, RaffleDraft, RaffleId},
    reservation::{NewHold, Reservation, ReservationId, ReservationStatus},
    store::{ReservationStore, StatusFilter, StoreResult, StoreState},
};

/// Store persisted as a single pretty-printed json snapshot.
///
/// Every mutation is applied to a copy of the state, written to a temp file and
/// renamed into place before the in-memory state is swapped. A failed write
/// leaves both the file and memory untouched.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    pub fn load_or_init(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.is_empty() {
                StoreState::default()
            } else {
                serde_json::from_slice(&bytes)?
            }
        } else {
            StoreState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.state.lock())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, state: &StoreState) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }
}

impl ReservationStore for JsonFileStore {
    fn active_raffle(&self) -> StoreResult<Option<RaffleConfig>> {
        Ok(self.read(StoreState::active_raffle))
    }

    fn raffle(&self, id: RaffleId) -> StoreResult<Option<RaffleConfig>> {
        Ok(self.read(|state| state.raffle(id)))
    }

    fn insert_raffle(&self, draft: RaffleDraft) -> StoreResult<RaffleConfig> {
        self.mutate(|state| state.insert_raffle(draft))
    }

    fn update_raffle(&self, config: RaffleConfig) -> StoreResult<RaffleConfig> {
        self.mutate(|state| state.update_raffle(config))
    }

    fn delete_raffle(&self, id: RaffleId) -> StoreResult<usize> {
        self.mutate(|state| state.delete_raffle(id))
    }

    fn reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        Ok(self.read(|state| state.reservation(id)))
    }

    fn reservations(
        &self,
        raffle_id: Option<RaffleId>,
        filter: StatusFilter,
    ) -> StoreResult<Vec<Reservation>> {
        Ok(self.read(|state| state.reservations(raffle_id, filter)))
    }

    fn insert_hold(&self, hold: NewHold) -> StoreResult<Reservation> {
        self.mutate(|state| state.insert_hold(hold))
    }

    fn update_if(
        &self,
        expected_status: ReservationStatus,
        expected_version: u32,
        next: Reservation,
    ) -> StoreResult<Reservation> {
        self.mutate(|state| state.update_if(expected_status, expected_version, next))
    }

    fn delete_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        self.mutate(|state| Ok(state.delete_reservation(id)))
    }
}
