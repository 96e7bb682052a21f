use super::error::PoolError;
use super::group::ProcessGroup;
use super::transport::{Message, Payload};
use super::world::World;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// The set of processes a collective operation runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommunicatorType {
    /// All processes of this process's group.
    GroupProcesses,
    /// The leader of every group.
    GroupLeaders,
    /// Every process in the pool.
    PoolProcesses,
}

impl CommunicatorType {
    pub(crate) fn tag(self) -> u32 {
        match self {
            CommunicatorType::GroupProcesses => 1,
            CommunicatorType::GroupLeaders => 2,
            CommunicatorType::PoolProcesses => 3,
        }
    }
}

/// A named set of cooperating processes, optionally split into groups with leaders.
///
/// Every process of the world constructs the same pool. Processes that are not listed are
/// marked as uninvolved and any communication through the pool fails for them.
#[derive(Debug)]
pub struct ProcessPool {
    world: World,
    name: String,
    world_ranks: Vec<usize>,
    pool_ranks: Vec<usize>,
    pool_rank: Option<usize>,
    max_process_groups: usize,
    groups: Vec<ProcessGroup>,
    group_index: usize,
    group_rank: usize,
    group_leaders: Vec<usize>,
    groups_modifiable: bool,
}

impl ProcessPool {
    /// Defines a pool over the given world ranks.
    ///
    /// Until [`assign_processes_to_groups`](Self::assign_processes_to_groups) is called, every
    /// process forms a group of its own.
    #[instrument(skip_all, name = "process_pool_set_up", fields(pool = %name))]
    pub fn set_up(name: &str, world: World, world_ranks: Vec<usize>) -> Result<Self, PoolError> {
        if world_ranks.is_empty() {
            return Err(PoolError::InvalidRanks(format!(
                "pool '{name}' contains no processes"
            )));
        }
        let mut seen = HashSet::new();
        for &rank in &world_ranks {
            if rank >= world.size() {
                return Err(PoolError::InvalidRanks(format!(
                    "world rank {rank} exceeds world size {}",
                    world.size()
                )));
            }
            if !seen.insert(rank) {
                return Err(PoolError::InvalidRanks(format!(
                    "world rank {rank} listed more than once"
                )));
            }
        }

        let n = world_ranks.len();
        let pool_rank = world_ranks.iter().position(|&r| r == world.rank());
        let groups = (0..n)
            .map(|p| ProcessGroup::new(p, vec![p], vec![world_ranks[p]]))
            .collect();

        match pool_rank {
            Some(rank) => info!(pool_rank = rank, n_processes = n, "Process pool set up."),
            None => debug!(
                world_rank = world.rank(),
                "Process is not involved in this pool."
            ),
        }

        Ok(Self {
            world,
            name: name.to_string(),
            world_ranks,
            pool_ranks: (0..n).collect(),
            pool_rank,
            max_process_groups: n,
            groups,
            group_index: pool_rank.unwrap_or(0),
            group_rank: 0,
            group_leaders: (0..n).collect(),
            groups_modifiable: true,
        })
    }

    /// Splits the pool into at most `max_groups` contiguous groups of near-equal size.
    ///
    /// This is collective over the whole pool.
    #[instrument(skip_all, name = "assign_processes_to_groups", fields(pool = %self.name))]
    pub fn assign_processes_to_groups(&mut self, max_groups: usize) -> Result<(), PoolError> {
        if !self.groups_modifiable {
            return Err(PoolError::GroupsFixed(self.name.clone()));
        }
        let my_rank = self.require_rank()?;
        let n = self.pool_size();
        let n_groups = max_groups.clamp(1, n);
        if n_groups != max_groups {
            warn!(
                requested = max_groups,
                used = n_groups,
                "Requested number of process groups adjusted to fit the pool."
            );
        }

        let base = n / n_groups;
        let remainder = n % n_groups;
        let groups: Vec<ProcessGroup> = (0..n_groups)
            .map(|k| {
                let first = base * k + k.min(remainder);
                let size = base + usize::from(k < remainder);
                let pool_ranks: Vec<usize> = (first..first + size).collect();
                let world_ranks = pool_ranks.iter().map(|&p| self.world_ranks[p]).collect();
                ProcessGroup::new(k, pool_ranks, world_ranks)
            })
            .collect();

        let (group_index, group_rank) = groups
            .iter()
            .find_map(|g| g.position(my_rank).map(|position| (g.index(), position)))
            .ok_or_else(|| {
                PoolError::Desynchronised(format!("pool rank {my_rank} not covered by any group"))
            })?;

        self.groups = groups;
        self.group_index = group_index;
        self.group_rank = group_rank;
        self.max_process_groups = n_groups;

        let leaders = self.gather_leader_roster()?;
        let expected: Vec<usize> = self.groups.iter().filter_map(ProcessGroup::leader).collect();
        if leaders != expected {
            return Err(PoolError::Desynchronised(format!(
                "group leader roster {leaders:?} does not match the local partition {expected:?}"
            )));
        }
        self.group_leaders = leaders;

        info!(
            n_groups,
            group_index, group_rank, "Processes assigned to groups."
        );
        Ok(())
    }

    fn gather_leader_roster(&self) -> Result<Vec<usize>, PoolError> {
        let comm = CommunicatorType::PoolProcesses;
        let am_leader = self.group_rank == 0;
        let mut roster: Vec<i64> = Vec::new();
        if self.is_master() {
            if am_leader {
                roster.push(0);
            }
            for rank in 1..self.pool_size() {
                if self.receive::<bool>(rank, comm)? {
                    roster.push(rank as i64);
                }
            }
        } else {
            self.send(am_leader, 0, comm)?;
        }
        self.broadcast_vec(&mut roster, 0, comm)?;
        Ok(roster.into_iter().map(|r| r as usize).collect())
    }

    /// Prevents any further regrouping of the pool.
    pub fn set_groups_fixed(&mut self) {
        self.groups_modifiable = false;
    }

    pub fn groups_modifiable(&self) -> bool {
        self.groups_modifiable
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_ranks(&self) -> &[usize] {
        &self.world_ranks
    }

    pub fn pool_size(&self) -> usize {
        self.world_ranks.len()
    }

    pub fn pool_rank(&self) -> Option<usize> {
        self.pool_rank
    }

    pub fn involves_me(&self) -> bool {
        self.pool_rank.is_some()
    }

    /// True on the pool leader (pool rank 0).
    pub fn is_master(&self) -> bool {
        self.pool_rank == Some(0)
    }

    pub fn max_process_groups(&self) -> usize {
        self.max_process_groups
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[ProcessGroup] {
        &self.groups
    }

    pub fn group_index(&self) -> usize {
        self.group_index
    }

    pub fn group_rank(&self) -> usize {
        self.group_rank
    }

    pub fn group_size(&self) -> usize {
        self.groups[self.group_index].n_processes()
    }

    pub fn is_group_leader(&self) -> bool {
        self.involves_me() && self.group_rank == 0
    }

    /// Pool ranks of every group leader, in group order.
    pub fn group_leaders(&self) -> &[usize] {
        &self.group_leaders
    }

    pub(crate) fn require_rank(&self) -> Result<usize, PoolError> {
        self.pool_rank.ok_or_else(|| PoolError::NotInPool {
            pool: self.name.clone(),
            world_rank: self.world.rank(),
        })
    }

    /// Pool ranks taking part in `comm`, ordered by their rank within it.
    pub fn members(&self, comm: CommunicatorType) -> Result<&[usize], PoolError> {
        self.require_rank()?;
        match comm {
            CommunicatorType::GroupProcesses => Ok(self.groups[self.group_index].pool_ranks()),
            CommunicatorType::GroupLeaders if self.is_group_leader() => Ok(&self.group_leaders),
            CommunicatorType::GroupLeaders => Err(PoolError::NotInScope(comm)),
            CommunicatorType::PoolProcesses => Ok(&self.pool_ranks),
        }
    }

    /// This process's rank within `comm`.
    pub fn scope_rank(&self, comm: CommunicatorType) -> Result<usize, PoolError> {
        let me = self.require_rank()?;
        self.members(comm)?
            .iter()
            .position(|&r| r == me)
            .ok_or(PoolError::NotInScope(comm))
    }

    pub fn scope_size(&self, comm: CommunicatorType) -> Result<usize, PoolError> {
        Ok(self.members(comm)?.len())
    }

    fn world_rank_in(&self, comm: CommunicatorType, rank: usize) -> Result<usize, PoolError> {
        let members = self.members(comm)?;
        let pool_rank = members.get(rank).ok_or(PoolError::RankOutOfScope {
            comm,
            rank,
            size: members.len(),
        })?;
        Ok(self.world_ranks[*pool_rank])
    }

    pub(crate) fn post(
        &self,
        comm: CommunicatorType,
        target: usize,
        payload: Payload,
    ) -> Result<(), PoolError> {
        let world_rank = self.world_rank_in(comm, target)?;
        self.world.transport().send(
            world_rank,
            Message {
                tag: comm.tag(),
                payload,
            },
        )?;
        Ok(())
    }

    pub(crate) fn fetch(&self, comm: CommunicatorType, source: usize) -> Result<Payload, PoolError> {
        let world_rank = self.world_rank_in(comm, source)?;
        let message = self.world.transport().receive(world_rank)?;
        if message.tag != comm.tag() {
            return Err(PoolError::Desynchronised(format!(
                "expected a {comm:?} message from rank {source}, received tag {}",
                message.tag
            )));
        }
        Ok(message.payload)
    }
}
