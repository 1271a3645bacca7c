mod storage;

use rand::{seq::SliceRandom, Rng};

use crate::station::{Station, StationUid};

pub use self::storage::default_stations;

/// Ordered collection of stations.  Order is insertion order, as edited by the
/// user, and is what sequential navigation walks.
#[derive(Debug, Clone, Default)]
pub struct StationList {
    stations: Vec<Station>,
    /// Lazily built permutation used in shuffle mode.  Dropped on any change to
    /// the membership or order of `stations`.
    shuffled: Option<Vec<StationUid>>,
}

impl StationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stations(stations: Vec<Station>) -> Self {
        Self {
            stations,
            shuffled: None,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    pub fn first(&self) -> Option<&Station> {
        self.stations.first()
    }

    pub fn last(&self) -> Option<&Station> {
        self.stations.last()
    }

    pub fn get(&self, index: usize) -> Option<&Station> {
        self.stations.get(index)
    }

    pub fn position(&self, uid: &StationUid) -> Option<usize> {
        self.stations.iter().position(|s| s.uid() == uid)
    }

    pub fn find(&self, uid: &StationUid) -> Option<&Station> {
        self.stations.iter().find(|s| s.uid() == uid)
    }

    pub fn find_mut(&mut self, uid: &StationUid) -> Option<&mut Station> {
        self.stations.iter_mut().find(|s| s.uid() == uid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Station> {
        self.stations.iter().find(|s| {
            s.name()
                .is_some_and(|station_name| station_name.eq_ignore_ascii_case(name))
        })
    }

    pub fn find_by_uri(&self, uri: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.uri() == uri)
    }

    /// Find a station from user input, trying the uid first, then the name,
    /// then the URI.
    pub fn guess(&self, text: &str) -> Option<&Station> {
        let text = text.trim();
        self.stations
            .iter()
            .find(|s| s.uid().as_str() == text)
            .or_else(|| self.find_by_name(text))
            .or_else(|| self.find_by_uri(text))
    }

    pub fn append(&mut self, station: Station) -> StationUid {
        let pos = self.stations.len();
        self.insert(pos, station)
    }

    pub fn prepend(&mut self, station: Station) -> StationUid {
        self.insert(0, station)
    }

    /// Insert at `pos`, or at the end if `pos` is past it.
    pub fn insert(&mut self, pos: usize, station: Station) -> StationUid {
        let uid = station.uid().clone();
        let pos = pos.min(self.stations.len());
        log::debug!("inserting station {} at {}", station, pos);
        self.stations.insert(pos, station);
        self.invalidate_shuffle();
        uid
    }

    /// Insert before `anchor`, or prepend if `anchor` is not in the list.
    pub fn insert_before(&mut self, anchor: &StationUid, station: Station) -> StationUid {
        let pos = self.position(anchor).unwrap_or(0);
        self.insert(pos, station)
    }

    /// Insert after `anchor`, or append if `anchor` is not in the list.
    pub fn insert_after(&mut self, anchor: &StationUid, station: Station) -> StationUid {
        let pos = self
            .position(anchor)
            .map_or(self.stations.len(), |pos| pos + 1);
        self.insert(pos, station)
    }

    pub fn remove(&mut self, uid: &StationUid) -> Option<Station> {
        let pos = self.position(uid)?;
        let station = self.stations.remove(pos);
        log::debug!("removed station {}", station);
        self.invalidate_shuffle();
        Some(station)
    }

    /// Move a station to `pos` (clamped to the last position).  Returns false if
    /// the station is not in the list.
    pub fn move_to(&mut self, uid: &StationUid, pos: usize) -> bool {
        let Some(from) = self.position(uid) else {
            return false;
        };
        let station = self.stations.remove(from);
        let pos = pos.min(self.stations.len());
        self.stations.insert(pos, station);
        if from != pos {
            self.invalidate_shuffle();
        }
        true
    }

    pub fn move_before(&mut self, uid: &StationUid, anchor: &StationUid) -> bool {
        if uid == anchor {
            return self.position(uid).is_some();
        }
        let (Some(from), Some(to)) = (self.position(uid), self.position(anchor)) else {
            return false;
        };
        // Removing the station first shifts the anchor left when it comes after.
        let to = if from < to { to - 1 } else { to };
        self.move_to(uid, to)
    }

    pub fn move_after(&mut self, uid: &StationUid, anchor: &StationUid) -> bool {
        if uid == anchor {
            return self.position(uid).is_some();
        }
        let (Some(from), Some(to)) = (self.position(uid), self.position(anchor)) else {
            return false;
        };
        let to = if from < to { to } else { to + 1 };
        self.move_to(uid, to)
    }

    pub fn move_first(&mut self, uid: &StationUid) -> bool {
        self.move_to(uid, 0)
    }

    pub fn move_last(&mut self, uid: &StationUid) -> bool {
        self.move_to(uid, usize::MAX)
    }

    pub fn clear(&mut self) {
        self.stations.clear();
        self.invalidate_shuffle();
    }

    /// Station following `current`.  Without repeat, walking past the end
    /// yields `None`.  In shuffle mode, the walk follows the shuffled order, and
    /// wrapping around (with repeat) reshuffles.
    pub fn next(
        &mut self,
        current: Option<&StationUid>,
        repeat: bool,
        shuffle: bool,
    ) -> Option<&Station> {
        let uid = if shuffle {
            self.shuffled_neighbor(current, repeat, Direction::Forward)
        } else {
            self.sequential_neighbor(current, repeat, Direction::Forward)
        }?;
        self.find(&uid)
    }

    /// Station preceding `current`, mirroring `next`.
    pub fn prev(
        &mut self,
        current: Option<&StationUid>,
        repeat: bool,
        shuffle: bool,
    ) -> Option<&Station> {
        let uid = if shuffle {
            self.shuffled_neighbor(current, repeat, Direction::Backward)
        } else {
            self.sequential_neighbor(current, repeat, Direction::Backward)
        }?;
        self.find(&uid)
    }

    fn sequential_neighbor(
        &self,
        current: Option<&StationUid>,
        repeat: bool,
        direction: Direction,
    ) -> Option<StationUid> {
        let order: Vec<&StationUid> = self.stations.iter().map(Station::uid).collect();
        neighbor(&order, current, repeat, direction).map(|uid| uid.to_owned())
    }

    fn shuffled_neighbor(
        &mut self,
        current: Option<&StationUid>,
        repeat: bool,
        direction: Direction,
    ) -> Option<StationUid> {
        if self.stations.is_empty() {
            return None;
        }
        let order = self.shuffled_order();
        let position = current.and_then(|uid| order.iter().position(|u| u == uid));
        match (position, direction) {
            (None, Direction::Forward) => order.first().cloned(),
            (None, Direction::Backward) => order.last().cloned(),
            (Some(pos), Direction::Forward) if pos + 1 < order.len() => {
                Some(order[pos + 1].clone())
            }
            (Some(pos), Direction::Backward) if pos > 0 => Some(order[pos - 1].clone()),
            (Some(_), _) if repeat => {
                // A whole cycle is done, start a new one in a fresh order.
                log::debug!("shuffle cycle complete, reshuffling");
                let order = self.reshuffle(current, direction);
                match direction {
                    Direction::Forward => order.first().cloned(),
                    Direction::Backward => order.last().cloned(),
                }
            }
            (Some(_), _) => None,
        }
    }

    fn shuffled_order(&mut self) -> &[StationUid] {
        let stations = &self.stations;
        self.shuffled
            .get_or_insert_with(|| shuffle_uids(stations, None, Direction::Forward))
    }

    fn reshuffle(&mut self, avoid: Option<&StationUid>, direction: Direction) -> &[StationUid] {
        let order = shuffle_uids(&self.stations, avoid, direction);
        self.shuffled.insert(order)
    }

    fn invalidate_shuffle(&mut self) {
        self.shuffled = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

fn neighbor<'a>(
    order: &[&'a StationUid],
    current: Option<&StationUid>,
    repeat: bool,
    direction: Direction,
) -> Option<&'a StationUid> {
    let position = current.and_then(|uid| order.iter().position(|u| *u == uid));
    let index = match (position, direction) {
        (None, Direction::Forward) => 0,
        (None, Direction::Backward) => order.len().checked_sub(1)?,
        (Some(pos), Direction::Forward) if pos + 1 < order.len() => pos + 1,
        (Some(pos), Direction::Backward) if pos > 0 => pos - 1,
        (Some(_), Direction::Forward) if repeat => 0,
        (Some(_), Direction::Backward) if repeat => order.len() - 1,
        (Some(_), _) => return None,
    };
    order.get(index).copied()
}

/// Randomize station order.  Stations are first sorted by a random key, and the
/// result is shuffled once more.  When `avoid` is given, it is kept away from
/// the slot that is visited first in `direction`, so that a new cycle does not
/// start by replaying the station that ended the previous one.
fn shuffle_uids(
    stations: &[Station],
    avoid: Option<&StationUid>,
    direction: Direction,
) -> Vec<StationUid> {
    let mut rng = rand::rng();
    let mut keyed: Vec<(u64, StationUid)> = stations
        .iter()
        .map(|s| (rng.random::<u64>(), s.uid().clone()))
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    let mut order: Vec<StationUid> = keyed.into_iter().map(|(_, uid)| uid).collect();
    order.shuffle(&mut rng);

    if let Some(avoid) = avoid {
        let len = order.len();
        let first = match direction {
            Direction::Forward => 0,
            Direction::Backward => len.saturating_sub(1),
        };
        if len > 1 && order[first] == *avoid {
            let other = match direction {
                Direction::Forward => rng.random_range(1..len),
                Direction::Backward => rng.random_range(0..len - 1),
            };
            order.swap(first, other);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn list_of(n: usize) -> (StationList, Vec<StationUid>) {
        let mut list = StationList::new();
        let uids = (0..n)
            .map(|i| {
                list.append(Station::new(
                    Some(format!("Station {i}")),
                    format!("http://s/{i}"),
                ))
            })
            .collect();
        (list, uids)
    }

    fn next_uid(
        list: &mut StationList,
        current: Option<&StationUid>,
        repeat: bool,
        shuffle: bool,
    ) -> Option<StationUid> {
        list.next(current, repeat, shuffle).map(|s| s.uid().clone())
    }

    fn prev_uid(
        list: &mut StationList,
        current: Option<&StationUid>,
        repeat: bool,
        shuffle: bool,
    ) -> Option<StationUid> {
        list.prev(current, repeat, shuffle).map(|s| s.uid().clone())
    }

    #[test]
    fn sequential_stops_at_the_ends_without_repeat() {
        let (mut list, uids) = list_of(3);
        assert_eq!(next_uid(&mut list, Some(&uids[0]), false, false), Some(uids[1].clone()));
        assert_eq!(next_uid(&mut list, Some(&uids[2]), false, false), None);
        assert_eq!(prev_uid(&mut list, Some(&uids[1]), false, false), Some(uids[0].clone()));
        assert_eq!(prev_uid(&mut list, Some(&uids[0]), false, false), None);
    }

    #[test]
    fn sequential_wraps_with_repeat() {
        let (mut list, uids) = list_of(3);
        assert_eq!(next_uid(&mut list, Some(&uids[2]), true, false), Some(uids[0].clone()));
        assert_eq!(prev_uid(&mut list, Some(&uids[0]), true, false), Some(uids[2].clone()));
    }

    #[test]
    fn no_current_starts_from_the_ends() {
        let (mut list, uids) = list_of(3);
        assert_eq!(next_uid(&mut list, None, false, false), Some(uids[0].clone()));
        assert_eq!(prev_uid(&mut list, None, false, false), Some(uids[2].clone()));

        let mut empty = StationList::new();
        assert!(empty.next(None, true, false).is_none());
        assert!(empty.next(None, true, true).is_none());
    }

    #[test]
    fn shuffle_visits_every_station_once_per_cycle() {
        let (mut list, uids) = list_of(8);
        let mut seen = HashSet::new();
        let mut current = next_uid(&mut list, None, false, true);
        while let Some(uid) = current {
            assert!(seen.insert(uid.clone()), "station visited twice");
            current = next_uid(&mut list, Some(&uid), false, true);
        }
        assert_eq!(seen, uids.into_iter().collect::<HashSet<_>>());
    }

    #[test]
    fn shuffle_reshuffles_on_repeat_wrap() {
        let (mut list, uids) = list_of(5);
        let mut current = next_uid(&mut list, None, true, true).unwrap();
        for _ in 1..uids.len() {
            current = next_uid(&mut list, Some(&current), true, true).unwrap();
        }
        // `current` ends the first cycle; the next one starts with another station.
        let mut second_cycle = HashSet::new();
        let first_of_second = next_uid(&mut list, Some(&current), true, true).unwrap();
        assert_ne!(first_of_second, current);
        second_cycle.insert(first_of_second.clone());
        let mut current = first_of_second;
        for _ in 1..uids.len() {
            current = next_uid(&mut list, Some(&current), true, true).unwrap();
            assert!(second_cycle.insert(current.clone()));
        }
        assert_eq!(second_cycle.len(), uids.len());
    }

    #[test]
    fn backward_reshuffle_avoids_the_station_just_played() {
        for _ in 0..50 {
            let (mut list, uids) = list_of(2);
            let mut current = prev_uid(&mut list, None, true, true).unwrap();
            current = prev_uid(&mut list, Some(&current), true, true).unwrap();
            // `current` is the first of the cycle, walking back wraps around.
            let wrapped = prev_uid(&mut list, Some(&current), true, true).unwrap();
            assert_ne!(wrapped, current);
            assert!(uids.contains(&wrapped));
        }

        let (list, uids) = list_of(3);
        for _ in 0..50 {
            let order = shuffle_uids(&list.stations, Some(&uids[1]), Direction::Backward);
            assert_ne!(order.last(), Some(&uids[1]));
            assert_eq!(order.len(), 3);
        }
    }

    #[test]
    fn unknown_current_counts_as_none() {
        let (mut list, uids) = list_of(3);
        let stranger = Station::new(None, "http://elsewhere");
        let stranger = Some(stranger.uid());
        assert_eq!(next_uid(&mut list, stranger, false, false), Some(uids[0].clone()));
        assert_eq!(prev_uid(&mut list, stranger, false, false), Some(uids[2].clone()));

        let first = next_uid(&mut list, None, false, true);
        let last = prev_uid(&mut list, None, false, true);
        assert_eq!(next_uid(&mut list, stranger, false, true), first);
        assert_eq!(prev_uid(&mut list, stranger, false, true), last);
    }

    #[test]
    fn shuffle_is_stable_until_the_list_changes() {
        let (mut list, _) = list_of(6);
        let first = next_uid(&mut list, None, false, true);
        assert_eq!(next_uid(&mut list, None, false, true), first);

        let renamed = first.clone().unwrap();
        list.find_mut(&renamed).unwrap().set_name(Some("Renamed".into()));
        assert!(list.shuffled.is_some());

        list.append(Station::new(None, "http://s/new"));
        assert!(list.shuffled.is_none());
    }

    #[test]
    fn single_station_repeats_itself() {
        let (mut list, uids) = list_of(1);
        assert_eq!(next_uid(&mut list, Some(&uids[0]), true, true), Some(uids[0].clone()));
        assert_eq!(next_uid(&mut list, Some(&uids[0]), true, false), Some(uids[0].clone()));
        assert_eq!(next_uid(&mut list, Some(&uids[0]), false, true), None);
    }

    #[test]
    fn insertion_helpers_keep_order() {
        let (mut list, uids) = list_of(2);
        let a = list.insert_before(&uids[1], Station::new(None, "http://a"));
        let b = list.insert_after(&uids[1], Station::new(None, "http://b"));
        let c = list.prepend(Station::new(None, "http://c"));
        let order: Vec<_> = list.iter().map(|s| s.uid().clone()).collect();
        assert_eq!(order, vec![c, uids[0].clone(), a, uids[1].clone(), b]);
    }

    #[test]
    fn moving_stations() {
        let (mut list, uids) = list_of(4);
        assert!(list.move_to(&uids[0], 2));
        assert_eq!(list.position(&uids[0]), Some(2));

        assert!(list.move_before(&uids[3], &uids[1]));
        assert_eq!(list.position(&uids[3]), Some(0));

        assert!(list.move_after(&uids[3], &uids[2]));
        let order: Vec<_> = list.iter().map(|s| s.uid().clone()).collect();
        assert_eq!(
            order,
            vec![uids[1].clone(), uids[2].clone(), uids[3].clone(), uids[0].clone()]
        );

        assert!(list.move_first(&uids[2]));
        assert!(list.move_last(&uids[1]));
        assert_eq!(list.first().unwrap().uid(), &uids[2]);
        assert_eq!(list.last().unwrap().uid(), &uids[1]);

        let stranger = Station::new(None, "http://x");
        assert!(!list.move_to(stranger.uid(), 0));
    }

    #[test]
    fn guess_tries_uid_name_then_uri() {
        let (list, uids) = list_of(3);
        assert_eq!(list.guess(uids[1].as_str()).unwrap().uid(), &uids[1]);
        assert_eq!(list.guess("station 2").unwrap().uid(), &uids[2]);
        assert_eq!(list.guess("http://s/0").unwrap().uid(), &uids[0]);
        assert!(list.guess("nope").is_none());
    }

    #[test]
    fn removing_unknown_station_is_a_no_op() {
        let (mut list, uids) = list_of(2);
        assert!(list.remove(&uids[0]).is_some());
        assert!(list.remove(&uids[0]).is_none());
        assert_eq!(list.len(), 1);
    }
}
