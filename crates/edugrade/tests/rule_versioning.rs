//! Effective-dated rule versions loaded from CSV rule tables.

mod common {
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;

    use edugrade::catalog::OptionsSnapshot;
    use edugrade::conversion::{
        ConversionConfig, ConversionEngine, ConversionRule, CountryScope, Direction, RuleId,
        RuleStore, StoreError, SystemCode,
    };
    use edugrade::seed::SeedLoader;

    pub(super) type SeededEngine = ConversionEngine<MemoryRuleStore, OptionsSnapshot>;

    pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    pub(super) fn engine() -> (SeededEngine, Arc<MemoryRuleStore>) {
        let bundle = SeedLoader::default()
            .parse_str(include_str!("../data/seed.json"))
            .expect("bundled seed parses");
        let store = Arc::new(MemoryRuleStore::default());
        let engine = ConversionEngine::new(
            store.clone(),
            Arc::new(bundle.catalog),
            ConversionConfig::default(),
        );
        (engine, store)
    }

    #[derive(Default)]
    pub(super) struct MemoryRuleStore {
        pub(super) rules: Mutex<Vec<ConversionRule>>,
    }

    impl RuleStore for MemoryRuleStore {
        fn find_rules(
            &self,
            system: &SystemCode,
            country: &CountryScope,
            direction: Direction,
        ) -> Result<Vec<ConversionRule>, StoreError> {
            let guard = self.rules.lock().expect("store mutex poisoned");
            Ok(guard
                .iter()
                .filter(|rule| {
                    &rule.system == system
                        && rule.direction == direction
                        && (&rule.country == country || rule.country == CountryScope::Any)
                })
                .cloned()
                .collect())
        }

        fn insert_rule(&self, rule: ConversionRule) -> Result<ConversionRule, StoreError> {
            self.rules
                .lock()
                .expect("store mutex poisoned")
                .push(rule.clone());
            Ok(rule)
        }

        fn update_rule_validity(
            &self,
            id: &RuleId,
            valid_to: Option<NaiveDate>,
        ) -> Result<(), StoreError> {
            let mut guard = self.rules.lock().expect("store mutex poisoned");
            let rule = guard
                .iter_mut()
                .find(|rule| &rule.id == id)
                .ok_or(StoreError::NotFound)?;
            rule.valid_to = valid_to;
            Ok(())
        }
    }
}

use std::io::Cursor;

use assert_matches::assert_matches;
use common::*;
use edugrade::conversion::{
    ConversionError, CountryScope, Direction, LevelStage, RuleCriteria, SystemCode,
};
use edugrade::seed::{SeedBundle, SeedLoader};

const GCSE_VERSIONS: &str = "\
direction,system,country,grade_min,grade_max,valid_from,valid_to,source,target
TO_REFERENCE,GBR_GCSE,GBR,9,12,2017-09-01,,9,7
TO_REFERENCE,GBR_GCSE,GBR,9,12,2017-09-01,,8,6.5
TO_REFERENCE,GBR_GCSE,GBR,9,12,2017-09-01,,4,4
TO_ZA,GBR_GCSE,GBR,9,12,2023-09-01,,9,7
TO_ZA,GBR_GCSE,GBR,9,12,2023-09-01,,8,7
TO_ZA,GBR_GCSE,GBR,9,12,2023-09-01,,4,4.5
";

fn gcse(level: u32, on: chrono::NaiveDate) -> RuleCriteria {
    RuleCriteria::new(
        SystemCode::new("GBR_GCSE"),
        CountryScope::parse("GBR"),
        Direction::ToReference,
        LevelStage(level),
    )
    .on(on)
}

fn versions() -> Vec<edugrade::conversion::RuleDraft> {
    SeedLoader::default()
        .rule_table_from_reader(Cursor::new(GCSE_VERSIONS))
        .expect("rule table parses")
}

#[test]
fn table_versions_supersede_in_date_order() {
    let (engine, store) = engine();
    let mut drafts = versions();
    drafts.reverse();
    let bundle = SeedBundle {
        rules: drafts,
        ..SeedBundle::default()
    };

    let report = bundle.register_into(&engine).expect("versions register");
    assert_eq!(report.inserted, 2);
    assert_eq!(report.superseded, 1);
    assert_eq!(store.rules.lock().expect("store mutex poisoned").len(), 2);

    assert_eq!(
        engine
            .convert("8", &gcse(11, date(2020, 1, 1)))
            .expect("converts"),
        "6.5"
    );
    assert_eq!(
        engine
            .convert("8", &gcse(11, date(2023, 9, 1)))
            .expect("converts"),
        "7"
    );
    assert_matches!(
        engine.convert("8", &gcse(11, date(2017, 8, 31))),
        Err(ConversionError::NoApplicableRule { .. })
    );
    assert_matches!(
        engine.convert("8", &gcse(8, date(2020, 1, 1))),
        Err(ConversionError::NoApplicableRule { .. })
    );
}

#[test]
fn history_and_current_version_follow_registration() {
    let (engine, _) = engine();
    for draft in versions() {
        engine.register_rule(draft).expect("registers");
    }
    let system = SystemCode::new("GBR_GCSE");
    let gbr = CountryScope::parse("GBR");

    let history = engine
        .rule_history(&system, &gbr, Direction::ToReference)
        .expect("history loads");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].valid_to, Some(date(2023, 9, 1)));
    assert_eq!(history[1].valid_to, None);

    let current = engine
        .current_rule(&system, &gbr, Direction::ToReference, LevelStage(10))
        .expect("lookup succeeds")
        .expect("current version present");
    assert_eq!(current.id, history[1].id);
    assert_eq!(current.lookup("4"), Some("4.5"));
}

#[test]
fn replaying_a_table_is_rejected_without_side_effects() {
    let (engine, store) = engine();
    for draft in versions() {
        engine.register_rule(draft).expect("registers");
    }
    let before = store.rules.lock().expect("store mutex poisoned").clone();

    for draft in versions() {
        assert_matches!(
            engine.register_rule(draft),
            Err(ConversionError::OverlappingRuleVersion { .. })
        );
    }
    assert_eq!(*store.rules.lock().expect("store mutex poisoned"), before);
}
