//! Batching of memory requests by region. Region-addressed protocols issue
//! one command per memory type and answer in the order commands were sent,
//! so groups keep the order in which each type was first seen and members
//! keep their order within the batch.
use smallvec::SmallVec;

use crate::snes::{
    mapping::MappingResult,
    memory::{MemoryType, resolve_address},
};

use super::request::MemoryRequest;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GroupMember {
    /// Position of the request in the original batch.
    pub index: usize,
    pub pak_address: u32,
    /// Offset relative to the start of the region.
    pub offset: u32,
    pub size: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestGroup {
    pub memory_type: MemoryType,
    pub members: SmallVec<[GroupMember; 4]>,
}

impl RequestGroup {
    pub fn total_size(&self) -> usize {
        self.members.iter().map(|member| member.size).sum()
    }
}

pub type RequestGroups = SmallVec<[RequestGroup; 4]>;

/// Resolves every request and groups them by memory type. Any request that
/// cannot be resolved fails the whole batch.
pub fn group_by_memory_type<R: MemoryRequest>(requests: &[R]) -> MappingResult<RequestGroups> {
    let mut groups = RequestGroups::new();
    for (index, request) in requests.iter().enumerate() {
        let resolved = resolve_address(request.request_address())?;
        let member = GroupMember {
            index,
            pak_address: resolved.pak_address,
            offset: resolved.offset,
            size: request.size(),
        };
        match groups
            .iter_mut()
            .find(|group| group.memory_type == resolved.memory_type)
        {
            Some(group) => group.members.push(member),
            None => {
                let mut members = SmallVec::new();
                members.push(member);
                groups.push(RequestGroup {
                    memory_type: resolved.memory_type,
                    members,
                });
            }
        }
    }
    Ok(groups)
}

/// Splits one reply payload across the members of `group` in member order.
/// Returns `None` when the payload length does not match the group.
pub fn split_payload<'a>(
    group: &RequestGroup,
    payload: &'a [u8],
) -> Option<SmallVec<[(GroupMember, &'a [u8]); 4]>> {
    if payload.len() != group.total_size() {
        return None;
    }
    let mut rest = payload;
    let mut parts = SmallVec::new();
    for member in &group.members {
        let (head, tail) = rest.split_at(member.size);
        parts.push((*member, head));
        rest = tail;
    }
    Some(parts)
}
