//! HTTP client tests against mocked collaborators.

use std::time::Duration;

use common::{BroadcastPatch, GroupId, GroupPatch, GroupStatus, NewBroadcast, NewGroup};
use saga::{
    BroadcastClient, ClientError, GroupingClient, HttpBroadcastClient, HttpGroupingClient,
    JoinCoordinator, JoinError, JoinOutcome, JoinRequest, JoinStep, RestoredRecord,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_millis(300);

fn grouping_client(server: &MockServer) -> HttpGroupingClient {
    HttpGroupingClient::new(&format!("{}/grouping", server.uri()), TIMEOUT).unwrap()
}

fn broadcast_client(server: &MockServer) -> HttpBroadcastClient {
    HttpBroadcastClient::new(&format!("{}/broadcast", server.uri()), TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_get_group_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grouping/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": { "grouping_id": 2, "no_of_pax": 3, "description": "hikers", "status": 0 }
        })))
        .mount(&server)
        .await;

    let group = grouping_client(&server)
        .get(&GroupId::from(2))
        .await
        .unwrap();

    assert_eq!(group.group_id, GroupId::from(2));
    assert_eq!(group.no_of_pax, 3);
    assert_eq!(group.status, GroupStatus::Seeking);
}

/// Mounts the read phase of a join of group 2 into host group 1, answered
/// with the collaborators' id-less record bodies.
async fn mount_reads(server: &MockServer, host_pax: u32, lf_pax: u32, joining_pax: u32) {
    Mock::given(method("GET"))
        .and(path("/grouping/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "no_of_pax": joining_pax, "description": "joining", "status": 0
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/grouping/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "no_of_pax": host_pax, "description": "host", "status": 0
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broadcast/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lf_pax": lf_pax, "description": "need more", "status": 0
        })))
        .mount(server)
        .await;
}

async fn received(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| format!("{} {}", request.method, request.url.path()))
        .collect()
}

#[tokio::test]
async fn test_get_group_takes_id_from_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grouping/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "no_of_pax": 3, "description": "x", "status": 0
        })))
        .mount(&server)
        .await;

    let group = grouping_client(&server)
        .get(&GroupId::from(2))
        .await
        .unwrap();
    assert_eq!(group.group_id, GroupId::from(2));
    assert_eq!(group.no_of_pax, 3);
}

#[tokio::test]
async fn test_get_broadcast_takes_id_from_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broadcast/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lf_pax": 5, "description": "x", "status": 0
        })))
        .mount(&server)
        .await;

    let broadcast = broadcast_client(&server)
        .get(&GroupId::from(1))
        .await
        .unwrap();
    assert_eq!(broadcast.grouping_id, GroupId::from(1));
    assert_eq!(broadcast.lf_pax, 5);
}

#[tokio::test]
async fn test_update_without_id_in_response_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/broadcast/1"))
        .and(body_json(json!({ "lf_pax": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lf_pax": 2, "description": "x", "status": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let broadcast = broadcast_client(&server)
        .update(&GroupId::from(1), &BroadcastPatch { lf_pax: 2 })
        .await
        .unwrap();
    assert_eq!(broadcast.grouping_id, GroupId::from(1));
}

#[tokio::test]
async fn test_created_group_without_id_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/grouping"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "no_of_pax": 10, "description": "Complete group!", "status": 1
        })))
        .mount(&server)
        .await;

    let err = grouping_client(&server)
        .create(&NewGroup::merged(10))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn test_get_group_accepts_bare_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grouping/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "group_id": "5", "no_of_pax": 1, "description": "", "status": "COMPLETE"
        })))
        .mount(&server)
        .await;

    let group = grouping_client(&server)
        .get(&GroupId::from(5))
        .await
        .unwrap();
    assert_eq!(group.status, GroupStatus::Complete);
}

#[tokio::test]
async fn test_missing_group_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grouping/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404, "message": "Group not found."
        })))
        .mount(&server)
        .await;

    let err = grouping_client(&server)
        .get(&GroupId::from(9))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::NotFound {
            resource: "group",
            id: GroupId::from(9)
        }
    );
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broadcast/1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = broadcast_client(&server)
        .get(&GroupId::from(1))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_client_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/broadcast/1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("lf_pax must be positive"))
        .mount(&server)
        .await;

    let err = broadcast_client(&server)
        .update(&GroupId::from(1), &BroadcastPatch { lf_pax: 0 })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Rejected {
            status: 400,
            message: "lf_pax must be positive".to_string()
        }
    );
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grouping/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({ "grouping_id": 2, "no_of_pax": 3 })),
        )
        .mount(&server)
        .await;

    let err = grouping_client(&server)
        .get(&GroupId::from(2))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::timeout());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/grouping/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = grouping_client(&server)
        .get(&GroupId::from(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_collaborator_is_unavailable() {
    let client = HttpGroupingClient::new("http://127.0.0.1:9/grouping", TIMEOUT).unwrap();
    let err = client.get(&GroupId::from(1)).await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_create_group_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/grouping"))
        .and(body_json(json!({
            "description": "Complete group!", "no_of_pax": 10, "status": "COMPLETE"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "code": 201,
            "data": { "grouping_id": 7, "no_of_pax": 10, "description": "Complete group!", "status": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let group = grouping_client(&server)
        .create(&NewGroup::merged(10))
        .await
        .unwrap();
    assert_eq!(group.group_id, GroupId::from(7));
}

#[tokio::test]
async fn test_update_group_sends_only_present_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/grouping/1"))
        .and(body_json(json!({ "no_of_pax": 8 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "grouping_id": 1, "no_of_pax": 8, "description": "", "status": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let group = grouping_client(&server)
        .update(&GroupId::from(1), &GroupPatch::pax(8))
        .await
        .unwrap();
    assert_eq!(group.no_of_pax, 8);
}

#[tokio::test]
async fn test_delete_broadcast() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/broadcast/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .expect(1)
        .mount(&server)
        .await;

    broadcast_client(&server)
        .delete(&GroupId::from(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_broadcast_for_group() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/broadcast/3"))
        .and(body_json(json!({ "description": "need 4", "lf_pax": 4 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "code": 201,
            "data": { "grouping_id": 3, "lf_pax": 4, "description": "need 4", "status": 0 }
        })))
        .mount(&server)
        .await;

    let broadcast = broadcast_client(&server)
        .create(
            &GroupId::from(3),
            &NewBroadcast {
                description: "need 4".to_string(),
                lf_pax: 4,
            },
        )
        .await
        .unwrap();
    assert_eq!(broadcast.grouping_id, GroupId::from(3));
    assert_eq!(broadcast.lf_pax, 4);
}

#[tokio::test]
async fn test_list_broadcasts_unwraps_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broadcast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": { "broadcasts": [
                { "grouping_id": 1, "lf_pax": 5, "description": "a", "status": 0 },
                { "grouping_id": 4, "lf_pax": 2, "description": "b", "status": 0 }
            ] }
        })))
        .mount(&server)
        .await;

    let broadcasts = broadcast_client(&server).list().await.unwrap();
    assert_eq!(broadcasts.len(), 2);
    assert_eq!(broadcasts[1].grouping_id, GroupId::from(4));
}

#[tokio::test]
async fn test_empty_listing_404_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broadcast"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404, "message": "There are no broadcasts."
        })))
        .mount(&server)
        .await;

    let broadcasts = broadcast_client(&server).list().await.unwrap();
    assert!(broadcasts.is_empty());
}

#[tokio::test]
async fn test_partial_fill_over_http() {
    let server = MockServer::start().await;
    mount_reads(&server, 4, 5, 3).await;
    Mock::given(method("PATCH"))
        .and(path("/grouping/1"))
        .and(body_json(json!({ "no_of_pax": 7 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "no_of_pax": 7, "description": "host", "status": 0
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/broadcast/1"))
        .and(body_json(json!({ "lf_pax": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lf_pax": 2, "description": "need more", "status": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = JoinCoordinator::new(grouping_client(&server), broadcast_client(&server));
    let outcome = coordinator.join(JoinRequest::new("2", "1")).await.unwrap();

    assert_eq!(
        outcome,
        JoinOutcome::PartiallyFilled {
            host_group_id: GroupId::from(1),
            new_lf_pax: 2,
            host_no_of_pax: 7,
        }
    );
}

#[tokio::test]
async fn test_perfect_match_merges_over_http() {
    let server = MockServer::start().await;
    mount_reads(&server, 5, 5, 5).await;
    for (resource, id) in [("broadcast", 1), ("grouping", 2), ("grouping", 1)] {
        Mock::given(method("DELETE"))
            .and(path(format!("/{resource}/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/grouping"))
        .and(body_json(json!({
            "description": "Complete group!", "no_of_pax": 10, "status": "COMPLETE"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "code": 201,
            "data": { "grouping_id": 9, "no_of_pax": 10, "description": "Complete group!", "status": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = JoinCoordinator::new(grouping_client(&server), broadcast_client(&server));
    let outcome = coordinator.join(JoinRequest::new("2", "1")).await.unwrap();

    assert_eq!(
        outcome,
        JoinOutcome::Merged {
            new_group_id: GroupId::from(9),
            no_of_pax: 10,
        }
    );
    assert_eq!(
        received(&server).await,
        vec![
            "GET /grouping/2",
            "GET /broadcast/1",
            "GET /grouping/1",
            "DELETE /broadcast/1",
            "DELETE /grouping/2",
            "DELETE /grouping/1",
            "POST /grouping",
        ]
    );
}

#[tokio::test]
async fn test_failed_merged_create_restores_records_over_http() {
    let server = MockServer::start().await;
    mount_reads(&server, 5, 5, 5).await;
    for (resource, id) in [("broadcast", 1), ("grouping", 2), ("grouping", 1)] {
        Mock::given(method("DELETE"))
            .and(path(format!("/{resource}/{id}")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/grouping"))
        .and(body_json(json!({
            "description": "Complete group!", "no_of_pax": 10, "status": "COMPLETE"
        })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    for (description, new_id) in [("host", 11), ("joining", 12)] {
        Mock::given(method("POST"))
            .and(path("/grouping"))
            .and(body_json(json!({
                "description": description, "no_of_pax": 5, "status": "SEEKING"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "grouping_id": new_id, "no_of_pax": 5, "description": description, "status": 0
            })))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/broadcast/11"))
        .and(body_json(json!({ "description": "need more", "lf_pax": 5 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "lf_pax": 5, "description": "need more", "status": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = JoinCoordinator::new(grouping_client(&server), broadcast_client(&server));
    let err = coordinator
        .join(JoinRequest::new("2", "1"))
        .await
        .unwrap_err();

    let JoinError::PartialMerge(report) = &err else {
        panic!("expected a partial merge, got {err:?}");
    };
    assert_eq!(report.failed_step, JoinStep::CreateMergedGroup);
    assert_eq!(
        report.completed_steps,
        vec![
            JoinStep::DeleteHostBroadcast,
            JoinStep::DeleteJoiningGroup,
            JoinStep::DeleteHostGroup,
        ]
    );
    assert_eq!(
        report.restored,
        vec![
            RestoredRecord {
                undone: JoinStep::DeleteHostGroup,
                group_id: GroupId::from(11),
            },
            RestoredRecord {
                undone: JoinStep::DeleteJoiningGroup,
                group_id: GroupId::from(12),
            },
            RestoredRecord {
                undone: JoinStep::DeleteHostBroadcast,
                group_id: GroupId::from(11),
            },
        ]
    );
    assert!(report.fully_restored());
    assert!(!err.needs_reconciliation());
}
