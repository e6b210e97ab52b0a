//! Payload chunking (spec §4.6): split `componentDetails` across chunks
//! bounded by a configured serialized-byte size. Chunks are 1-based and
//! carry the same trigger/deployment id.

use crate::payload::{ChunkInfo, ComponentDetail, MessageType, StatusPayload};

/// Packs `template.component_details` into one or more payloads whose
/// serialized size stays at or under `max_bytes`, greedily filling each
/// chunk before starting the next. A single component that alone exceeds
/// `max_bytes` still gets its own chunk rather than being dropped.
pub fn chunk(template: &StatusPayload, max_bytes: usize) -> Vec<StatusPayload> {
    let mut groups: Vec<Vec<ComponentDetail>> = Vec::new();
    let mut current: Vec<ComponentDetail> = Vec::new();

    for detail in &template.component_details {
        let mut candidate = current.clone();
        candidate.push(detail.clone());
        if !current.is_empty() && serialized_size(template, &candidate) > max_bytes {
            groups.push(std::mem::take(&mut current));
            current = vec![detail.clone()];
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() || groups.is_empty() {
        groups.push(current);
    }

    let total_chunks = groups.len() as u32;
    groups
        .into_iter()
        .enumerate()
        .map(|(index, component_details)| StatusPayload {
            ggc_version: template.ggc_version.clone(),
            thing: template.thing.clone(),
            overall_status: StatusPayload::overall_status_for(&template.component_details),
            message_type: if total_chunks > 1 { MessageType::Partial } else { MessageType::Complete },
            trigger: template.trigger,
            chunk_info: if total_chunks > 1 {
                Some(ChunkInfo { chunk_id: index as u32 + 1, total_chunks })
            } else {
                None
            },
            deployment_information: template.deployment_information.clone(),
            component_details,
        })
        .collect()
}

fn serialized_size(template: &StatusPayload, component_details: &[ComponentDetail]) -> usize {
    let probe = StatusPayload {
        ggc_version: template.ggc_version.clone(),
        thing: template.thing.clone(),
        overall_status: StatusPayload::overall_status_for(&template.component_details),
        message_type: MessageType::Partial,
        trigger: template.trigger,
        chunk_info: Some(ChunkInfo { chunk_id: 1, total_chunks: 1 }),
        deployment_information: template.deployment_information.clone(),
        component_details: component_details.to_vec(),
    };
    serde_json::to_vec(&probe).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::OverallStatus;

    fn detail(name: &str) -> ComponentDetail {
        ComponentDetail {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            state: "RUNNING".to_string(),
            is_root: false,
        }
    }

    fn template(component_details: Vec<ComponentDetail>) -> StatusPayload {
        StatusPayload {
            ggc_version: "2.0.0".into(),
            thing: "device-1".into(),
            overall_status: OverallStatus::Healthy,
            message_type: MessageType::Complete,
            trigger: crate::trigger::Trigger::Cadence,
            chunk_info: None,
            deployment_information: None,
            component_details,
        }
    }

    #[test]
    fn fits_in_a_single_chunk_when_under_the_bound() {
        let payload = template(vec![detail("A"), detail("B")]);
        let chunks = chunk(&payload, 64 * 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].message_type, MessageType::Complete);
        assert!(chunks[0].chunk_info.is_none());
    }

    #[test]
    fn splits_across_chunks_once_the_bound_is_exceeded() {
        let components: Vec<ComponentDetail> = (0..50).map(|i| detail(&format!("Component{i}"))).collect();
        let payload = template(components);
        let chunks = chunk(&payload, 512);
        assert!(chunks.len() > 1);
        for (index, c) in chunks.iter().enumerate() {
            assert_eq!(c.message_type, MessageType::Partial);
            let info = c.chunk_info.unwrap();
            assert_eq!(info.chunk_id, index as u32 + 1);
            assert_eq!(info.total_chunks, chunks.len() as u32);
        }
        let recombined: usize = chunks.iter().map(|c| c.component_details.len()).sum();
        assert_eq!(recombined, 50);
    }

    #[test]
    fn a_single_oversized_component_still_gets_its_own_chunk() {
        let payload = template(vec![detail("Oversized")]);
        let chunks = chunk(&payload, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].component_details.len(), 1);
    }
}
