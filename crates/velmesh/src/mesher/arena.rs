//! Per-worker storage of owned points.
use glam::DVec3;

/// Globally unique point identifier.
///
/// Worker `rank` of `size` hands out `serial * size + rank`, so ids never collide across
/// workers and no coordination is needed to insert points.
pub type PointId = u64;

/// One owned point as it travels between workers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PointRecord {
    pub id: PointId,
    pub position: DVec3,
    /// Fixed points never move and are never deleted.
    pub fixed: bool,
}

/// The points owned by one worker, kept in insertion order.
#[derive(Debug)]
pub(crate) struct PointArena {
    rank: u64,
    size: u64,
    next_serial: u64,
    records: Vec<PointRecord>,
}

impl PointArena {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank: rank as u64,
            size: size as u64,
            next_serial: 0,
            records: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> PointId {
        let id = self.next_serial * self.size + self.rank;
        self.next_serial += 1;
        id
    }

    /// Adds a new point with a fresh id.
    pub fn insert(&mut self, position: DVec3, fixed: bool) -> PointId {
        let id = self.allocate_id();
        self.records.push(PointRecord {
            id,
            position,
            fixed,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [PointRecord] {
        &mut self.records
    }

    pub fn positions(&self) -> Vec<DVec3> {
        self.records.iter().map(|r| r.position).collect()
    }

    /// Removes every point whose id is listed in `ids` (sorted ascending). Fixed points stay.
    pub fn remove_sorted(&mut self, ids: &[PointId]) -> usize {
        let before = self.records.len();
        self.records
            .retain(|r| r.fixed || ids.binary_search(&r.id).is_err());
        before - self.records.len()
    }

    /// Takes out the points `owner` assigns to other workers, grouped by destination rank.
    pub fn take_emigrants(&mut self, owner: impl Fn(DVec3) -> usize) -> Vec<Vec<PointRecord>> {
        let mut outgoing = vec![Vec::new(); self.size as usize];
        let rank = self.rank as usize;
        self.records.retain(|r| {
            let dest = owner(r.position);
            if dest == rank {
                true
            } else {
                outgoing[dest].push(*r);
                false
            }
        });
        outgoing
    }

    /// Adopts points received from other workers. Their ids stay unchanged.
    pub fn absorb(&mut self, incoming: impl IntoIterator<Item = PointRecord>) {
        self.records.extend(incoming);
    }

    pub fn into_records(self) -> Vec<PointRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_interleaved_by_rank() {
        let mut a = PointArena::new(0, 3);
        let mut b = PointArena::new(2, 3);
        let ida: Vec<_> = (0..3).map(|_| a.insert(DVec3::ZERO, false)).collect();
        let idb: Vec<_> = (0..3).map(|_| b.insert(DVec3::ZERO, false)).collect();
        assert_eq!(ida, vec![0, 3, 6]);
        assert_eq!(idb, vec![2, 5, 8]);
    }

    #[test]
    fn removal_spares_fixed_points() {
        let mut arena = PointArena::new(0, 1);
        let fixed = arena.insert(DVec3::ZERO, true);
        let free = arena.insert(DVec3::X, false);
        let removed = arena.remove_sorted(&[fixed, free]);
        assert_eq!(removed, 1);
        assert_eq!(arena.records()[0].id, fixed);
    }

    #[test]
    fn emigrants_are_grouped_by_destination() {
        let mut arena = PointArena::new(1, 3);
        arena.insert(DVec3::new(0.5, 0.0, 0.0), false);
        arena.insert(DVec3::new(1.5, 0.0, 0.0), false);
        arena.insert(DVec3::new(2.5, 0.0, 0.0), true);
        let out = arena.take_emigrants(|p| p.x.floor() as usize);
        assert_eq!(out[0].len(), 1);
        assert!(out[1].is_empty());
        assert!(out[2][0].fixed);
        assert_eq!(arena.len(), 1);

        let mut other = PointArena::new(0, 3);
        other.absorb(out.into_iter().flatten());
        assert_eq!(other.len(), 2);
    }
}
