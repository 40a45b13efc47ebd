//! Gap-limit discovery of active addresses
//!
//! Recovers every address that has ever been used on chain without knowing
//! up front how many exist. Each group is scanned independently in
//! increasing index order until `min_gap` consecutive unused addresses
//! follow the last used one.
//!
//! The first round derives `min_gap` candidates for every group and checks
//! them all together, `PAGE_SIZE` addresses per oracle call. Groups whose
//! trailing gap is still short then extend on their own.
//!
//! Discovery is all-or-nothing: any oracle failure aborts the whole call.

use crate::address::{Address, AddressIndex, Group};
use crate::keys::{derive_address_in_group, AccountKey, AddressRecord, DeriveError};
use std::collections::BTreeSet;
use thiserror::Error;

/// Addresses per oracle request
pub const PAGE_SIZE: usize = 80;

/// Default number of consecutive unused addresses that ends a group's scan
pub const DEFAULT_MIN_GAP: usize = 5;

/// Failure reported by (or about) the usage oracle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Oracle answered {got} results for {expected} addresses")]
    LengthMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Oracle failure: {0}")]
    OracleFailure(#[from] OracleError),
    #[error(transparent)]
    Derive(#[from] DeriveError),
    #[error("min_gap must be at least 1")]
    InvalidGap,
}

/// Answers "has this address ever been used?" for a batch of addresses.
///
/// The response must be index-aligned with the request.
pub trait AddressOracle {
    fn check_addresses_used(&self, addresses: &[Address]) -> Result<Vec<bool>, OracleError>;
}

impl<F> AddressOracle for F
where
    F: Fn(&[Address]) -> Result<Vec<bool>, OracleError>,
{
    fn check_addresses_used(&self, addresses: &[Address]) -> Result<Vec<bool>, OracleError> {
        self(addresses)
    }
}

/// Discovery parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Consecutive unused addresses that end a group's scan
    pub min_gap: usize,
    /// Indexes never derived or queried (already assigned elsewhere)
    pub skip_indexes: Vec<AddressIndex>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            min_gap: DEFAULT_MIN_GAP,
            skip_indexes: Vec::new(),
        }
    }
}

/// Find all active addresses across every group.
///
/// Results are ordered by group, then by index.
pub fn discover_active_addresses<O: AddressOracle + ?Sized>(
    account: &AccountKey,
    oracle: &O,
    options: &DiscoveryOptions,
) -> Result<Vec<AddressRecord>, DiscoveryError> {
    discover_paged(account, oracle, options, PAGE_SIZE)
}

fn discover_paged<O: AddressOracle + ?Sized>(
    account: &AccountKey,
    oracle: &O,
    options: &DiscoveryOptions,
    page_size: usize,
) -> Result<Vec<AddressRecord>, DiscoveryError> {
    let min_gap = options.min_gap;
    if min_gap == 0 {
        return Err(DiscoveryError::InvalidGap);
    }

    let mut reserved: BTreeSet<AddressIndex> = options.skip_indexes.iter().copied().collect();

    let mut batches = Vec::new();
    for group in Group::all() {
        let batch = derive_batch(account, group, min_gap, AddressIndex::default(), &mut reserved)?;
        batches.push((group, batch));
    }

    let candidates: Vec<Address> = batches
        .iter()
        .flat_map(|(_, batch)| batch.iter().map(|r| *r.hash()))
        .collect();
    let mut used = query_used(oracle, &candidates, page_size)?.into_iter();

    let mut active = Vec::new();
    for (group, batch) in batches {
        let mut scan = GroupScan::new(group);
        let first_round: Vec<bool> = used.by_ref().take(batch.len()).collect();
        scan.absorb(batch, &first_round, &mut active);

        while scan.gap < min_gap {
            let start = scan.next_start()?;
            let more = derive_batch(account, group, min_gap - scan.gap, start, &mut reserved)?;
            let hashes: Vec<Address> = more.iter().map(|r| *r.hash()).collect();
            let results = query_used(oracle, &hashes, page_size)?;
            scan.absorb(more, &results, &mut active);
        }

        log::debug!(
            "group {}: scanned up to index {:?}, {} active so far",
            group,
            scan.highest.map(AddressIndex::value),
            active.len()
        );
    }

    log::info!("discovery found {} active addresses", active.len());
    Ok(active)
}

/// Running state of one group's scan
struct GroupScan {
    group: Group,
    gap: usize,
    highest: Option<AddressIndex>,
}

impl GroupScan {
    fn new(group: Group) -> Self {
        Self {
            group,
            gap: 0,
            highest: None,
        }
    }

    /// Walk results in index order, keeping used records and tracking the gap
    fn absorb(&mut self, batch: Vec<AddressRecord>, used: &[bool], active: &mut Vec<AddressRecord>) {
        for (record, &is_used) in batch.into_iter().zip(used) {
            debug_assert_eq!(record.group(), self.group);
            self.highest = Some(record.index());
            if is_used {
                self.gap = 0;
                active.push(record);
            } else {
                self.gap += 1;
            }
        }
    }

    fn next_start(&self) -> Result<AddressIndex, DeriveError> {
        match self.highest {
            None => Ok(AddressIndex::default()),
            Some(highest) => highest.next().ok_or(DeriveError::DerivationExhausted {
                group: self.group,
                start: highest,
                attempts: 0,
            }),
        }
    }
}

/// Derive `amount` consecutive in-group addresses from `start`, reserving
/// each index as it is assigned.
fn derive_batch(
    account: &AccountKey,
    group: Group,
    amount: usize,
    start: AddressIndex,
    reserved: &mut BTreeSet<AddressIndex>,
) -> Result<Vec<AddressRecord>, DeriveError> {
    let mut batch: Vec<AddressRecord> = Vec::with_capacity(amount);
    let mut next = Some(start);

    for _ in 0..amount {
        let from = next.ok_or(DeriveError::DerivationExhausted {
            group,
            start,
            attempts: 0,
        })?;
        let record = derive_address_in_group(account, group, from, reserved)?;
        reserved.insert(record.index());
        next = record.index().next();
        batch.push(record);
    }
    Ok(batch)
}

/// Ask the oracle about `addresses`, `page_size` at a time
fn query_used<O: AddressOracle + ?Sized>(
    oracle: &O,
    addresses: &[Address],
    page_size: usize,
) -> Result<Vec<bool>, OracleError> {
    let mut used = Vec::with_capacity(addresses.len());
    for page in addresses.chunks(page_size) {
        let answer = oracle.check_addresses_used(page)?;
        if answer.len() != page.len() {
            return Err(OracleError::LengthMismatch {
                expected: page.len(),
                got: answer.len(),
            });
        }
        used.extend(answer);
    }
    log::debug!(
        "checked {} addresses in {} requests",
        addresses.len(),
        addresses.len().div_ceil(page_size)
    );
    Ok(used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_address;
    use crate::mnemonic::mnemonic_to_seed;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    const VAULT: &str = "vault alarm sad mass witness property virus style good flower rice alpha viable evidence run glare pretty scout evil judge enroll refuse another lava";

    fn account() -> AccountKey {
        AccountKey::from_seed(&mnemonic_to_seed(VAULT, "").unwrap()).unwrap()
    }

    /// The first `n` indexes that land in `group`, in order
    fn indexes_in_group(account: &AccountKey, group: Group, n: usize) -> Vec<AddressIndex> {
        let mut found = Vec::new();
        let mut i = 0;
        while found.len() < n {
            let index = AddressIndex::new(i).unwrap();
            if derive_address(account, index).unwrap().group() == group {
                found.push(index);
            }
            i += 1;
        }
        found
    }

    fn address_set(account: &AccountKey, indexes: &[AddressIndex]) -> HashSet<Address> {
        indexes
            .iter()
            .map(|i| *derive_address(account, *i).unwrap().hash())
            .collect()
    }

    #[test]
    fn test_active_positions_0_1_3_found_in_two_round_trips() {
        let account = account();
        let group = Group::new(1).unwrap();
        let in_group = indexes_in_group(&account, group, 10);
        let expected = vec![in_group[0], in_group[1], in_group[3]];
        let used = address_set(&account, &expected);

        let calls = Cell::new(0);
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            calls.set(calls.get() + 1);
            Ok(addresses.iter().map(|a| used.contains(a)).collect())
        };

        let found = discover_active_addresses(&account, &oracle, &DiscoveryOptions::default()).unwrap();
        let found_indexes: Vec<AddressIndex> = found.iter().map(|r| r.index()).collect();

        assert_eq!(found_indexes, expected);
        assert!(found.iter().all(|r| r.group() == group));
        assert!(calls.get() < 3, "used {} round trips", calls.get());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_gap_limit_stops_after_last_active() {
        let account = account();
        let group = Group::new(0).unwrap();
        let in_group = indexes_in_group(&account, group, 20);
        let expected = vec![in_group[0], in_group[4], in_group[9]];
        let used = address_set(&account, &expected);

        let queried = RefCell::new(Vec::new());
        let seen = RefCell::new(HashSet::new());
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            queried.borrow_mut().push(addresses.len());
            seen.borrow_mut().extend(addresses.iter().copied());
            Ok(addresses.iter().map(|a| used.contains(a)).collect())
        };

        let found = discover_active_addresses(&account, &oracle, &DiscoveryOptions::default()).unwrap();
        let found_indexes: Vec<AddressIndex> = found.iter().map(|r| r.index()).collect();
        assert_eq!(found_indexes, expected);

        // 20 candidates, then positions 5..10 and 10..15 of the active group
        assert_eq!(*queried.borrow(), vec![20, 5, 5]);

        let seen = seen.borrow();
        let last_queried = address_set(&account, &in_group[14..15]);
        let past_gap = address_set(&account, &in_group[15..]);
        assert!(last_queried.iter().all(|a| seen.contains(a)));
        assert!(past_gap.iter().all(|a| !seen.contains(a)));
    }

    #[test]
    fn test_nothing_used_is_one_round_trip() {
        let account = account();
        let calls = Cell::new(0);
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            calls.set(calls.get() + 1);
            Ok(vec![false; addresses.len()])
        };

        let found = discover_active_addresses(&account, &oracle, &DiscoveryOptions::default()).unwrap();
        assert!(found.is_empty());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_pages_are_at_most_page_size() {
        let account = account();
        let sizes = RefCell::new(Vec::new());
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            sizes.borrow_mut().push(addresses.len());
            Ok(vec![false; addresses.len()])
        };

        let options = DiscoveryOptions {
            min_gap: 30,
            ..Default::default()
        };
        discover_active_addresses(&account, &oracle, &options).unwrap();

        // 4 groups x 30 = 120 candidates -> ceil(120 / 80) = 2 requests
        assert_eq!(*sizes.borrow(), vec![80, 40]);
    }

    #[test]
    fn test_result_independent_of_page_size() {
        let account = account();
        let mut expected = Vec::new();
        for group in Group::all() {
            let in_group = indexes_in_group(&account, group, 8);
            expected.push(in_group[0]);
            expected.push(in_group[2]);
        }
        let used = address_set(&account, &expected);
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            Ok(addresses.iter().map(|a| used.contains(a)).collect())
        };

        let options = DiscoveryOptions::default();
        let by_80: Vec<_> = discover_paged(&account, &oracle, &options, 80)
            .unwrap()
            .iter()
            .map(|r| r.index())
            .collect();
        let by_3: Vec<_> = discover_paged(&account, &oracle, &options, 3)
            .unwrap()
            .iter()
            .map(|r| r.index())
            .collect();

        assert_eq!(by_80, by_3);
        assert_eq!(by_80.len(), expected.len());
    }

    #[test]
    fn test_skipped_indexes_are_never_queried() {
        let account = account();
        let skip: Vec<AddressIndex> = (0..6).map(|i| AddressIndex::new(i).unwrap()).collect();
        let skipped = address_set(&account, &skip);

        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            assert!(addresses.iter().all(|a| !skipped.contains(a)));
            Ok(vec![false; addresses.len()])
        };

        let options = DiscoveryOptions {
            skip_indexes: skip.clone(),
            ..Default::default()
        };
        let found = discover_active_addresses(&account, &oracle, &options).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_oracle_failure_aborts() {
        let account = account();
        let oracle = |_: &[Address]| -> Result<Vec<bool>, OracleError> {
            Err(OracleError::Request("timeout".into()))
        };
        let result = discover_active_addresses(&account, &oracle, &DiscoveryOptions::default());
        assert_eq!(
            result.unwrap_err(),
            DiscoveryError::OracleFailure(OracleError::Request("timeout".into()))
        );
    }

    #[test]
    fn test_failure_during_extension_aborts() {
        let account = account();
        let group = Group::new(2).unwrap();
        let first = indexes_in_group(&account, group, 5);
        let used = address_set(&account, &first[4..]);

        let calls = Cell::new(0);
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            calls.set(calls.get() + 1);
            if calls.get() > 1 {
                return Err(OracleError::Request("connection reset".into()));
            }
            Ok(addresses.iter().map(|a| used.contains(a)).collect())
        };

        let result = discover_active_addresses(&account, &oracle, &DiscoveryOptions::default());
        assert!(matches!(result, Err(DiscoveryError::OracleFailure(_))));
    }

    #[test]
    fn test_short_answer_is_rejected() {
        let account = account();
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            Ok(vec![false; addresses.len() - 1])
        };
        let result = discover_active_addresses(&account, &oracle, &DiscoveryOptions::default());
        assert_eq!(
            result.unwrap_err(),
            DiscoveryError::OracleFailure(OracleError::LengthMismatch {
                expected: 20,
                got: 19
            })
        );
    }

    #[test]
    fn test_zero_gap_rejected() {
        let account = account();
        let oracle = |addresses: &[Address]| -> Result<Vec<bool>, OracleError> {
            Ok(vec![false; addresses.len()])
        };
        let options = DiscoveryOptions {
            min_gap: 0,
            ..Default::default()
        };
        assert_eq!(
            discover_active_addresses(&account, &oracle, &options).unwrap_err(),
            DiscoveryError::InvalidGap
        );
    }
}
