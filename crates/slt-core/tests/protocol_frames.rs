use serde_json::{Value, json};
use slt_core::{
    CallVendorRequest, Frame, FrameError, Identify, LowerThirdList, OpCode, RequestFrame,
    RequestId, RequestResponse, RequestStatus, ServerFrame, VendorEvent, VendorRequest,
    VisibilityChanged, event_subscription,
    vendor::{self, VENDOR_NAME, decode_response, unwrap_response_data, vendor_error},
};

fn response_with(data: Value) -> RequestResponse {
    RequestResponse {
        request_type: "CallVendorRequest".to_string(),
        request_id: RequestId::from("req_1_0"),
        request_status: RequestStatus {
            result: true,
            code: 100,
            comment: None,
        },
        response_data: Some(data),
    }
}

#[test]
fn request_frame_matches_wire_shape() {
    let frame = RequestFrame {
        request_type: "GetVersion".to_string(),
        request_id: RequestId::from("req_7_1700000000000"),
        request_data: json!({}),
    };

    let encoded = serde_json::to_value(frame.into_envelope()).expect("encode should succeed");
    assert_eq!(
        encoded,
        json!({
            "op": 6,
            "d": {
                "requestType": "GetVersion",
                "requestId": "req_7_1700000000000",
                "requestData": {}
            }
        })
    );
}

#[test]
fn identify_omits_missing_authentication() {
    let anonymous = Identify {
        rpc_version: 1,
        authentication: None,
        event_subscriptions: event_subscription::NONE,
    };
    let encoded = serde_json::to_value(anonymous.into_envelope()).expect("encode should succeed");
    assert_eq!(
        encoded,
        json!({ "op": 1, "d": { "rpcVersion": 1, "eventSubscriptions": 0 } })
    );

    let authed = Identify {
        rpc_version: 1,
        authentication: Some("proof".to_string()),
        event_subscriptions: event_subscription::VENDORS,
    };
    let encoded = serde_json::to_value(authed.into_envelope()).expect("encode should succeed");
    assert_eq!(encoded["d"]["authentication"], "proof");
    assert_eq!(encoded["d"]["eventSubscriptions"], 512);
}

#[test]
fn hello_parses_with_and_without_challenge() {
    let plain = ServerFrame::from_json(r#"{"op":0,"d":{"obsWebSocketVersion":"5.4.2","rpcVersion":1}}"#)
        .expect("hello should parse");
    match plain {
        ServerFrame::Hello(hello) => {
            assert_eq!(hello.negotiated_rpc_version(), 1);
            assert!(hello.authentication.is_none());
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    let challenged = ServerFrame::from_json(
        r#"{"op":0,"d":{"rpcVersion":0,"authentication":{"challenge":"c","salt":"s"}}}"#,
    )
    .expect("hello should parse");
    match challenged {
        ServerFrame::Hello(hello) => {
            assert_eq!(hello.negotiated_rpc_version(), 1, "zero falls back");
            let auth = hello.authentication.expect("challenge present");
            assert_eq!(auth.challenge, "c");
            assert_eq!(auth.salt, "s");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[test]
fn response_frame_parses_status_and_comment() {
    let frame = ServerFrame::from_json(
        r#"{"op":7,"d":{"requestId":"x","requestType":"ToggleVisible",
            "requestStatus":{"result":false,"code":500,"comment":"not found"}}}"#,
    )
    .expect("response should parse");

    assert_eq!(frame.op(), OpCode::RequestResponse);
    let ServerFrame::RequestResponse(response) = frame else {
        panic!("expected request response");
    };
    assert_eq!(response.request_id, RequestId::from("x"));
    assert!(!response.request_status.result);
    assert_eq!(response.request_status.code, 500);
    assert_eq!(response.request_status.comment.as_deref(), Some("not found"));
    assert!(response.response_data.is_none());
}

#[test]
fn malformed_and_unknown_frames_are_rejected() {
    assert!(matches!(
        ServerFrame::from_json("not json"),
        Err(FrameError::Json(_))
    ));
    assert!(matches!(
        ServerFrame::from_json(r#"{"op":42,"d":{}}"#),
        Err(FrameError::UnknownOpCode(42))
    ));
    assert!(matches!(
        ServerFrame::from_json(r#"{"op":6,"d":{}}"#),
        Err(FrameError::UnexpectedOpCode(6))
    ));
}

#[test]
fn call_vendor_request_nests_type_and_data() {
    let wrapped = CallVendorRequest::lower_thirds(&VendorRequest::SetVisible {
        id: "lt_1".to_string(),
        visible: true,
    });

    assert_eq!(
        serde_json::to_value(&wrapped).expect("encode should succeed"),
        json!({
            "vendorName": VENDOR_NAME,
            "requestType": "SetVisible",
            "requestData": { "id": "lt_1", "visible": true }
        })
    );
}

#[test]
fn response_data_unwraps_one_or_two_levels() {
    let items = json!({ "ok": true, "items": [{ "id": "a" }, { "id": "b", "isVisible": true }] });

    let flat = response_with(items.clone());
    let once = response_with(json!({ "vendorName": VENDOR_NAME, "responseData": items.clone() }));
    let twice = response_with(json!({ "responseData": { "responseData": items.clone() } }));

    for response in [&flat, &once, &twice] {
        assert_eq!(unwrap_response_data(response), Some(&items));
        let list: LowerThirdList = decode_response(response).expect("items should decode");
        assert_eq!(list.items.len(), 2);
        assert!(list.items[1].is_visible);
    }
}

#[test]
fn missing_response_data_decodes_as_empty() {
    let mut response = response_with(json!({}));
    response.response_data = None;

    assert!(unwrap_response_data(&response).is_none());
    let list: LowerThirdList = decode_response(&response).expect("empty payload should decode");
    assert!(list.items.is_empty());
}

#[test]
fn vendor_error_reads_ok_false_payloads() {
    assert_eq!(
        vendor_error(&json!({ "ok": false, "error": "Invalid id" })).as_deref(),
        Some("Invalid id")
    );
    assert_eq!(vendor_error(&json!({ "ok": false })).as_deref(), Some("unknown"));
    assert!(vendor_error(&json!({ "ok": true })).is_none());
    assert!(vendor_error(&json!({ "items": [] })).is_none());
}

#[test]
fn vendor_event_carries_nested_payload() {
    let frame = ServerFrame::from_json(
        r#"{"op":5,"d":{"eventType":"VendorEvent","eventIntent":512,"eventData":{
            "vendorName":"smart-lower-thirds","eventType":"LowerThirdsVisibilityChanged",
            "eventData":{"id":"lt_1","visible":true,"visibleIds":[{"id":"lt_1"}]}}}}"#,
    )
    .expect("event should parse");

    let ServerFrame::Event(event) = frame else {
        panic!("expected event");
    };
    assert_eq!(event.event_type, vendor::VENDOR_EVENT);

    let inner: VendorEvent = serde_json::from_value(event.event_data).expect("vendor event");
    assert_eq!(inner.event_type, vendor::VISIBILITY_CHANGED);

    let changed: VisibilityChanged =
        serde_json::from_value(inner.event_data).expect("visibility payload");
    assert_eq!(changed.id, "lt_1");
    assert!(changed.visible);
    assert_eq!(changed.visible_ids.len(), 1);
}
