use oscquery_client::{
    decode_message, encode_message, node_at, parse_node, value_at, Access, ClientEvent, NodeKind,
    NodeType, OscArg, OscMessage, OscQueryError, Range, Rgba, SerializedNode, ServerMessage,
    Topic, Value,
};
use serde_json::json;

#[test]
fn osc_message_survives_encode_and_decode() {
    let msg = OscMessage::new(
        "/foo",
        vec![
            OscArg::Int(42),
            OscArg::Float(3.5),
            OscArg::String("hi".into()),
            OscArg::Bool(true),
        ],
    );
    let bytes = encode_message(&msg);
    assert_eq!(bytes.len() % 4, 0);
    assert_eq!(decode_message(&bytes).unwrap(), msg);
}

#[test]
fn truncated_frame_is_malformed() {
    let bytes = encode_message(&OscMessage::new("/foo", vec![OscArg::Double(1.0)]));
    let cut = &bytes[..bytes.len() - 3];
    assert!(matches!(decode_message(cut), Err(OscQueryError::MalformedWire(_))));
}

#[test]
fn color_argument_decodes_rgba() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"/c\0\0,r\0\0");
    bytes.extend_from_slice(&[0x10, 0x20, 0x30, 0xff]);
    let msg = decode_message(&bytes).unwrap();
    assert_eq!(msg.args, vec![OscArg::Color(Rgba::new(0x10, 0x20, 0x30, 0xff))]);
}

fn descriptor(json: serde_json::Value) -> SerializedNode {
    serde_json::from_value(json).unwrap()
}

#[test]
fn float_node_with_range() {
    let (info, value) = parse_node(&descriptor(json!({
        "FULL_PATH": "/x",
        "TYPE": "f",
        "VALUE": [0.5],
        "RANGE": [{"MIN": 0, "MAX": 1}],
        "ACCESS": 1
    })));
    assert_eq!(value, Value::Float(0.5));
    assert_eq!(info.access, Access::Read);
    assert_eq!(
        info.kind,
        NodeKind::Float {
            range: Some(Range {
                min: Some(0.0),
                max: Some(1.0)
            })
        }
    );
}

#[test]
fn nested_tree_resolves_by_path() {
    let (info, value) = parse_node(&descriptor(json!({
        "FULL_PATH": "/",
        "CONTENTS": {
            "mixer": {
                "FULL_PATH": "/mixer",
                "CONTENTS": {
                    "mode": {
                        "FULL_PATH": "/mixer/mode",
                        "TYPE": "s",
                        "VALUE": ["add"],
                        "RANGE": [{"VALS": ["add", "multiply"]}]
                    },
                    "tint": {"FULL_PATH": "/mixer/tint", "TYPE": "r", "VALUE": [0xff0000ffu32]},
                    "pos": {"FULL_PATH": "/mixer/pos", "TYPE": "fff", "VALUE": [1, 2, 3]}
                }
            }
        }
    })));

    assert_eq!(node_at(&info, "/mixer").map(|n| n.node_type()), Some(NodeType::Container));
    assert_eq!(
        value_at(&value, "/mixer/mode"),
        Some(&Value::String("add".into()))
    );
    assert_eq!(
        value_at(&value, "/mixer/tint"),
        Some(&Value::Color(Rgba::new(0xff, 0, 0, 0xff)))
    );
    match node_at(&info, "/mixer/mode").map(|n| &n.kind) {
        Some(NodeKind::String { enum_values }) => {
            assert_eq!(enum_values.as_deref(), Some(&["add".to_string(), "multiply".to_string()][..]));
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert!(value_at(&value, "/mixer/missing").is_none());

    let mut paths = Vec::new();
    info.walk(&mut |n| paths.push(n.full_path.clone()));
    assert_eq!(paths.len(), 5);
}

#[test]
fn server_messages_parse() {
    let added: ServerMessage =
        serde_json::from_value(json!({"COMMAND": "PATH_ADDED", "DATA": "/a"})).unwrap();
    assert_eq!(added, ServerMessage::PathAdded("/a".into()));

    let renamed: ServerMessage = serde_json::from_value(
        json!({"COMMAND": "PATH_RENAMED", "DATA": {"OLD": "/a", "NEW": "/b"}}),
    )
    .unwrap();
    match renamed {
        ServerMessage::PathRenamed(data) => {
            assert_eq!(data.old, "/a");
            assert_eq!(data.new, "/b");
        }
        other => panic!("unexpected message {:?}", other),
    }
}

#[test]
fn event_topics() {
    assert!("Path-Added".parse::<Topic>().is_ok());
    assert!("/a b/c".parse::<Topic>().is_ok());
    assert!("nope".parse::<Topic>().is_err());

    let event = ClientEvent::PathRemoved { path: "/a".into() };
    assert_eq!(event.kind().map(|k| k.to_string()).as_deref(), Some("path-removed"));
}
