use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{compute_emissions, compute_sink, net_emission, Areas, EmissionBreakdown, Quantities};
use crate::error::{HistoryError, RemoteError, SessionError};
use crate::guards::{InputGuard, MineProfile, Registration};
use crate::history::{included_only, History, Storage, EMISSION_HISTORY_KEY, PATHWAY_HISTORY_KEY};
use crate::pathway::{PathwayInputs, PathwayResult, PathwayResults, Strategy, StrategyVisibility};
use crate::report;
use crate::snapshot::{EmissionSnapshot, PathwaySnapshot, REPORT_TIMESTAMP_FORMAT};
use crate::sync::{Collection, Identity, RemoteStore, User};

/// What happened to a save request. `Display` gives the user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written locally and mirrored to the signed-in user's profile.
    Synced,
    /// Written locally; nobody is signed in.
    LocalOnly,
    /// Written locally; the remote write failed and will not be retried.
    SyncFailed(String),
    /// The local write failed, so no sync was attempted.
    NotPersisted(String),
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOutcome::Synced => f.write_str("Saved and synced to your profile."),
            SaveOutcome::LocalOnly => f.write_str("Saved locally. Sign in to sync with your profile."),
            SaveOutcome::SyncFailed(_) => f.write_str("Saved locally. Error syncing with profile."),
            SaveOutcome::NotPersisted(e) => write!(f, "Could not save locally: {e}"),
        }
    }
}

/// Session-scoped state of one calculator user.
///
/// The engines are pure; this controller owns the current results and the two
/// histories and decides when the collaborators are consulted. Local history
/// writes always complete before any remote attempt for the same snapshot.
pub struct Session<S, I, R>
where
    S: Storage,
    I: Identity,
    R: RemoteStore,
{
    breakdown: Option<EmissionBreakdown>,
    total_sink: Option<f64>,
    pathway_inputs: PathwayInputs,
    pathway_results: PathwayResults,
    pub visibility: StrategyVisibility,
    emissions: History<EmissionSnapshot, S>,
    pathways: History<PathwaySnapshot, S>,
    identity: I,
    remote: R,
}

impl<S, I, R> Session<S, I, R>
where
    S: Storage + Clone,
    I: Identity,
    R: RemoteStore,
{
    pub fn open(storage: S, identity: I, remote: R) -> Self {
        Session {
            breakdown: None,
            total_sink: None,
            pathway_inputs: PathwayInputs::default(),
            pathway_results: PathwayResults::default(),
            visibility: StrategyVisibility::default(),
            emissions: History::load(storage.clone(), EMISSION_HISTORY_KEY),
            pathways: History::load(storage, PATHWAY_HISTORY_KEY),
            identity,
            remote,
        }
    }
}

impl<S, I, R> Session<S, I, R>
where
    S: Storage,
    I: Identity,
    R: RemoteStore,
{
    // ---- Emission / sink ------------------------------------------------

    pub fn calculate_emissions(&mut self, quantities: &Quantities) -> &EmissionBreakdown {
        self.breakdown.insert(compute_emissions(quantities))
    }

    pub fn calculate_sink(&mut self, areas: &Areas) -> f64 {
        let sink = compute_sink(areas);
        self.total_sink = Some(sink);
        sink
    }

    pub fn breakdown(&self) -> Option<&EmissionBreakdown> {
        self.breakdown.as_ref()
    }

    pub fn total_emission(&self) -> f64 {
        self.breakdown.as_ref().map_or(0.0, |b| b.total)
    }

    pub fn total_sink(&self) -> f64 {
        self.total_sink.unwrap_or(0.0)
    }

    pub fn net(&self) -> f64 {
        net_emission(self.total_emission(), self.total_sink())
    }

    /// Reset the current calculation. History is untouched.
    pub fn clear_page(&mut self) {
        self.breakdown = None;
        self.total_sink = None;
    }

    // ---- Pathways -------------------------------------------------------

    pub fn set_pathway_inputs(&mut self, inputs: PathwayInputs) {
        self.pathway_inputs = inputs;
    }

    pub fn pathway_inputs(&self) -> &PathwayInputs {
        &self.pathway_inputs
    }

    pub fn calculate_pathway(&mut self, strategy: Strategy) -> PathwayResult {
        let result = strategy.evaluate(&self.pathway_inputs);
        self.pathway_results.set(strategy, result);
        result
    }

    pub fn calculate_afforestation(&mut self) -> PathwayResult {
        self.calculate_pathway(Strategy::Afforestation)
    }

    pub fn calculate_methane(&mut self) -> PathwayResult {
        self.calculate_pathway(Strategy::Methane)
    }

    pub fn calculate_renewable(&mut self) -> PathwayResult {
        self.calculate_pathway(Strategy::Renewable)
    }

    pub fn pathway_results(&self) -> &PathwayResults {
        &self.pathway_results
    }

    /// Reset pathway inputs and results. History is untouched.
    pub fn clear_pathway(&mut self) {
        self.pathway_inputs = PathwayInputs::default();
        self.pathway_results = PathwayResults::default();
    }

    // ---- Saving ---------------------------------------------------------

    pub fn save_calculation(&mut self) -> SaveOutcome {
        self.save_calculation_at(&Local::now())
    }

    pub fn save_calculation_at<Tz: TimeZone>(&mut self, at: &DateTime<Tz>) -> SaveOutcome
    where
        Tz::Offset: fmt::Display,
    {
        let breakdown = self.breakdown.clone().unwrap_or_default();
        let snapshot = EmissionSnapshot::taken_at(&breakdown, self.total_sink(), at);
        let document = serde_json::to_value(&snapshot);
        if let Err(e) = self.emissions.append(snapshot) {
            warn!(error = %e, "emission snapshot not persisted");
            return SaveOutcome::NotPersisted(e.to_string());
        }
        info!(len = self.emissions.len(), "saved calculation");
        self.mirror(Collection::Emissions, document)
    }

    pub fn save_pathway(&mut self) -> SaveOutcome {
        self.save_pathway_at(&Local::now())
    }

    pub fn save_pathway_at<Tz: TimeZone>(&mut self, at: &DateTime<Tz>) -> SaveOutcome
    where
        Tz::Offset: fmt::Display,
    {
        let snapshot = PathwaySnapshot::taken_at(&self.pathway_results, at);
        let document = serde_json::to_value(&snapshot);
        if let Err(e) = self.pathways.append(snapshot) {
            warn!(error = %e, "pathway snapshot not persisted");
            return SaveOutcome::NotPersisted(e.to_string());
        }
        info!(len = self.pathways.len(), "saved pathway");
        self.mirror(Collection::Pathways, document)
    }

    fn mirror(&mut self, collection: Collection, document: serde_json::Result<serde_json::Value>) -> SaveOutcome {
        let Some(user) = self.identity.current_user() else {
            return SaveOutcome::LocalOnly;
        };
        let result = document
            .map_err(RemoteError::from)
            .and_then(|doc| self.remote.append(&user.uid, collection, doc));
        match result {
            Ok(_) => SaveOutcome::Synced,
            Err(e) => {
                warn!(uid = %user.uid, collection = collection.name(), error = %e, "remote sync failed");
                SaveOutcome::SyncFailed(e.to_string())
            }
        }
    }

    // ---- History --------------------------------------------------------

    pub fn emission_history(&self) -> &History<EmissionSnapshot, S> {
        &self.emissions
    }

    pub fn pathway_history(&self) -> &History<PathwaySnapshot, S> {
        &self.pathways
    }

    pub fn recent_emissions(&self, n: usize) -> &[EmissionSnapshot] {
        self.emissions.query_recent(n)
    }

    pub fn set_included(&mut self, index: usize, included: bool) -> Result<(), HistoryError> {
        self.emissions.set_included(index, included)
    }

    pub fn set_pathway_included(&mut self, index: usize, included: bool) -> Result<(), HistoryError> {
        self.pathways.set_included(index, included)
    }

    pub fn clear_emission_history(&mut self) -> Result<(), HistoryError> {
        self.emissions.clear()
    }

    pub fn clear_pathway_history(&mut self) -> Result<(), HistoryError> {
        self.pathways.clear()
    }

    // ---- Reports --------------------------------------------------------

    /// CSV over the last `window` saved calculations that are still included.
    pub fn emission_report(&self, window: usize) -> String {
        let rows = included_only(self.emissions.query_recent(window));
        info!(rows = rows.len(), "exporting emission report");
        report::emissions_csv(&rows)
    }

    pub fn pathway_report(&self) -> String {
        self.pathway_report_at(&Local::now())
    }

    /// CSV of every calculated strategy that is currently shown.
    pub fn pathway_report_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        let generated = at.format(REPORT_TIMESTAMP_FORMAT).to_string();
        let visibility = self.visibility;
        let rows = self
            .pathway_results
            .iter()
            .filter(move |(s, _)| visibility.is_visible(*s));
        report::pathway_csv(rows, &generated)
    }

    // ---- Profile --------------------------------------------------------

    fn signed_in(&self) -> Result<User, SessionError> {
        self.identity.current_user().ok_or(SessionError::SignedOut)
    }

    /// Validate a registration and store it as the signed-in user's mine profile.
    pub fn register_mine(&mut self, registration: &Registration) -> Result<MineProfile, SessionError> {
        let user = self.signed_in()?;
        let profile = InputGuard::admit(registration, Utc::now())?;
        self.remote.put_profile(&user.uid, &profile)?;
        info!(uid = %user.uid, mine = %profile.mine_name, "registered mine");
        Ok(profile)
    }

    pub fn mine_profile(&self) -> Result<Option<MineProfile>, SessionError> {
        let user = self.signed_in()?;
        Ok(self.remote.get_profile(&user.uid)?)
    }

    /// Everything the signed-in user has synced, decoded. Documents that no
    /// longer decode are skipped.
    pub fn profile_data(&self) -> Result<ProfileData, SessionError> {
        let user = self.signed_in()?;
        Ok(ProfileData {
            emissions: decode_all(self.remote.list(&user.uid, Collection::Emissions)?),
            pathways: decode_all(self.remote.list(&user.uid, Collection::Pathways)?),
        })
    }

    pub fn profile_report(&self) -> Result<String, SessionError> {
        let data = self.profile_data()?;
        Ok(report::profile_csv(&data.emissions, &data.pathways))
    }
}

/// A user's synced results as read back from the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileData {
    pub emissions: Vec<EmissionSnapshot>,
    pub pathways: Vec<PathwaySnapshot>,
}

fn decode_all<T: serde::de::DeserializeOwned>(docs: Vec<serde_json::Value>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|d| match serde_json::from_value(d) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "skipping undecodable remote document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStorage;
    use crate::schema::Activity;
    use crate::sync::{InMemoryRemoteStore, LocalIdentity};
    use chrono::FixedOffset;
    use serde_json::Value;

    type TestSession = Session<MemoryStorage, LocalIdentity, InMemoryRemoteStore>;

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 10, day, hour, 30, 0)
            .unwrap()
    }

    fn user() -> User {
        User {
            uid: "mine-7".into(),
            email: "ops@mine.example".into(),
        }
    }

    fn session(storage: &MemoryStorage, identity: &LocalIdentity) -> TestSession {
        Session::open(storage.clone(), identity.clone(), InMemoryRemoteStore::new())
    }

    fn diesel(litres: f64) -> Quantities {
        let mut q = Quantities::new();
        q.insert(Activity::Diesel, litres);
        q
    }

    #[test]
    fn test_calculate_and_net() {
        let mut s = session(&MemoryStorage::new(), &LocalIdentity::new());
        assert_eq!(s.net(), 0.0);
        s.calculate_emissions(&diesel(1000.0));
        let mut areas = Areas::new();
        areas.insert(crate::schema::LandCover::Forest, 1.0);
        s.calculate_sink(&areas);
        assert!((s.total_emission() - 2.68).abs() < 1e-9);
        assert!((s.net() - (2.68 - 6.0)).abs() < 1e-9);

        s.clear_page();
        assert!(s.breakdown().is_none());
        assert_eq!(s.net(), 0.0);
    }

    #[test]
    fn test_save_signed_out_is_local_only() {
        let storage = MemoryStorage::new();
        let mut s = session(&storage, &LocalIdentity::new());
        s.calculate_emissions(&diesel(100.0));
        assert_eq!(s.save_calculation_at(&at(16, 9)), SaveOutcome::LocalOnly);
        assert_eq!(s.recent_emissions(1)[0].timestamp, "16 Oct, 9:30");

        let reopened = session(&storage, &LocalIdentity::new());
        assert_eq!(reopened.emission_history().len(), 1);
    }

    #[test]
    fn test_save_signed_in_syncs() {
        let identity = LocalIdentity::signed_in(user());
        let mut s = session(&MemoryStorage::new(), &identity);
        s.calculate_emissions(&diesel(100.0));
        assert_eq!(s.save_calculation_at(&at(16, 9)), SaveOutcome::Synced);

        s.set_pathway_inputs(PathwayInputs {
            fund: 50_000.0,
            land: 0.0,
            current_emission: 10.0,
        });
        s.calculate_methane();
        assert_eq!(s.save_pathway_at(&at(16, 10)), SaveOutcome::Synced);

        let data = s.profile_data().unwrap();
        assert_eq!(data.emissions.len(), 1);
        assert_eq!(data.pathways.len(), 1);
        assert!(data.pathways[0].afforestation.is_none());
        assert!(data.pathways[0].methane.is_some());
    }

    struct FailingRemote;

    impl RemoteStore for FailingRemote {
        fn append(&mut self, _: &str, _: Collection, _: Value) -> Result<String, RemoteError> {
            Err(RemoteError::Unavailable("offline".into()))
        }
        fn list(&self, _: &str, _: Collection) -> Result<Vec<Value>, RemoteError> {
            Err(RemoteError::Unavailable("offline".into()))
        }
        fn put_profile(&mut self, _: &str, _: &MineProfile) -> Result<(), RemoteError> {
            Err(RemoteError::Unavailable("offline".into()))
        }
        fn get_profile(&self, _: &str) -> Result<Option<MineProfile>, RemoteError> {
            Err(RemoteError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_sync_failure_keeps_local_write() {
        let storage = MemoryStorage::new();
        let mut s = Session::open(storage.clone(), LocalIdentity::signed_in(user()), FailingRemote);
        s.calculate_emissions(&diesel(10.0));
        let outcome = s.save_calculation_at(&at(1, 8));
        assert!(matches!(outcome, SaveOutcome::SyncFailed(_)));
        assert_eq!(outcome.to_string(), "Saved locally. Error syncing with profile.");
        assert_eq!(s.emission_history().len(), 1);
        assert!(matches!(s.profile_report(), Err(SessionError::Remote(_))));
    }

    #[derive(Clone)]
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn get(&self, _: &str) -> Result<Option<String>, crate::error::StoreError> {
            Ok(None)
        }
        fn set(&self, _: &str, _: &str) -> Result<(), crate::error::StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[test]
    fn test_local_failure_skips_sync() {
        let mut s = Session::open(ReadOnlyStorage, LocalIdentity::signed_in(user()), InMemoryRemoteStore::new());
        s.calculate_emissions(&diesel(10.0));
        let outcome = s.save_calculation_at(&at(1, 8));
        assert!(matches!(outcome, SaveOutcome::NotPersisted(_)));
        assert!(s.profile_data().unwrap().emissions.is_empty());
    }

    #[test]
    fn test_emission_report_windows_then_filters() {
        let mut s = session(&MemoryStorage::new(), &LocalIdentity::new());
        for day in 1..=4 {
            s.calculate_emissions(&diesel(100.0 * day as f64));
            s.save_calculation_at(&at(day, 12));
        }
        // exclude the newest entry
        s.set_included(3, false).unwrap();

        let csv = s.emission_report(2);
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with("3 Oct,12:30,"));

        assert_eq!(s.recent_emissions(2).len(), 2);
        assert!(s.set_included(9, false).is_err());
    }

    #[test]
    fn test_pathway_report_shows_visible_results() {
        let mut s = session(&MemoryStorage::new(), &LocalIdentity::new());
        s.set_pathway_inputs(PathwayInputs {
            fund: 100_000.0,
            land: 10.0,
            current_emission: 80.0,
        });
        s.calculate_afforestation();
        s.calculate_renewable();
        s.visibility.set(Strategy::Renewable, false);

        let csv = s.pathway_report_at(&at(16, 9));
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines[0], "ZeroSphere Pathway Report (Generated: 16 Oct 2026, 09:30)");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "Afforestation,80.00,20.00,60.00,60000");

        s.clear_pathway();
        assert!(s.pathway_results().is_empty());
        assert_eq!(s.pathway_report_at(&at(16, 9)).split('\n').count(), 2);
    }

    #[test]
    fn test_profile_requires_sign_in() {
        let identity = LocalIdentity::new();
        let mut s = session(&MemoryStorage::new(), &identity);
        assert!(matches!(s.profile_report(), Err(SessionError::SignedOut)));

        identity.sign_in(user());
        let reg = Registration {
            email: "ops@mine.example".into(),
            mine_name: "Jharia North".into(),
            mine_type: "Coal".into(),
            mine_state: "Jharkhand".into(),
        };
        let profile = s.register_mine(&reg).unwrap();
        assert_eq!(s.mine_profile().unwrap(), Some(profile));

        let bad = Registration::default();
        assert!(matches!(s.register_mine(&bad), Err(SessionError::Profile(_))));
    }

    #[test]
    fn test_clear_histories() {
        let mut s = session(&MemoryStorage::new(), &LocalIdentity::new());
        s.save_calculation_at(&at(1, 1));
        s.save_pathway_at(&at(1, 1));
        s.set_pathway_included(0, false).unwrap();
        assert!(!s.pathway_history().entries()[0].included);
        s.clear_emission_history().unwrap();
        s.clear_pathway_history().unwrap();
        assert!(s.emission_history().is_empty());
        assert!(s.pathway_history().is_empty());
    }
}
