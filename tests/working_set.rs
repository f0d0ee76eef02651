use mc_tally::engine::entity::{EntityRecord, EntityRegistry};
use mc_tally::engine::error::InvalidValueError;
use mc_tally::engine::history::HistoryWorkingSet;
use mc_tally::engine::moments::Moments;

fn records(entities: usize) -> Vec<EntityRecord> {
    (0..entities).map(|_| EntityRecord::new(2, 1)).collect()
}

#[test]
fn values_accumulate_until_the_fold() {
    let mut working = HistoryWorkingSet::new(2, 2, 1);
    working.add(0, 0, 1.5);
    working.add(0, 0, 0.5);
    working.add(1, 1, 3.0);

    assert!(working.is_dirty());
    assert_eq!(working.touched_entities(), &[0, 1]);
    assert_eq!(working.value(0, 0), 2.0);
    assert_eq!(working.value(1, 1), 3.0);
    assert_eq!(working.value(1, 0), 0.0);

    let mut recs = records(2);
    let mut total_bins = vec![Moments::ZERO; 2];
    let mut global = vec![Moments::ZERO; 1];
    working.fold_into(&mut recs, &mut total_bins, &mut global).unwrap();

    assert!(!working.is_dirty());
    assert!(working.touched_entities().is_empty());
    assert_eq!(working.value(0, 0), 0.0);
    assert_eq!(working.value(1, 1), 0.0);

    assert_eq!(recs[0].bin_moments[0].m1, 2.0);
    assert_eq!(recs[0].bin_moments[0].m2, 4.0);
    assert_eq!(recs[0].total_moments[0].m1, 2.0);
    assert_eq!(recs[1].bin_moments[1].m1, 3.0);
    assert_eq!(total_bins[0].m1, 2.0);
    assert_eq!(total_bins[1].m1, 3.0);
    assert_eq!(global[0].m1, 5.0);
    assert_eq!(global[0].m2, 25.0);
}

#[test]
fn overflowing_history_is_dropped_whole() {
    let mut working = HistoryWorkingSet::new(2, 2, 1);
    working.add(1, 0, 1.0);
    working.add(0, 1, 1e200);

    let mut recs = records(2);
    let mut total_bins = vec![Moments::ZERO; 2];
    let mut global = vec![Moments::ZERO; 1];
    assert_eq!(
        working.fold_into(&mut recs, &mut total_bins, &mut global),
        Err(InvalidValueError::NonFiniteMoment { contribution: 1e200 })
    );

    assert!(!working.is_dirty());
    assert_eq!(working.value(0, 1), 0.0);
    assert!(recs.iter().all(|r| r.bin_moments.iter().all(Moments::is_zero)));
    assert!(total_bins.iter().chain(global.iter()).all(Moments::is_zero));
}

#[test]
fn clear_discards_pending_values() {
    let mut working = HistoryWorkingSet::new(1, 3, 2);
    working.add(0, 5, 4.0);
    working.clear();
    assert!(!working.is_dirty());
    assert_eq!(working.value(0, 5), 0.0);
}

#[test]
fn registry_indices_follow_first_assignment() {
    let registry = EntityRegistry::from_lists(&[7, 3, 7, 9], &[1.0, 2.0, 8.0, 4.0]).unwrap();

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.index_of(3), Some(1));
    assert_eq!(registry.id_at(0), 7);
    assert_eq!(registry.id_at(2), 9);
    assert_eq!(registry.normalization_at(0), 1.0);
    assert_eq!(registry.normalization_at(2), 4.0);
    assert_eq!(registry.total_normalization(), 7.0);
}
