use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use silo_bus::frame::{encode_simple_message, encode_stop, encode_typed_message};
use silo_bus::monitor::{EXITING, RECEIVED, WAITING};
use silo_bus::{
    Actor, ActorConfig, ActorContext, ActorExit, Arg, Completion, Endpoint, Frame, MethodHandle,
    OperationRegistry, ResultCode, Serializer, Silo, SiloConfig, SiloError, Subscriber, TextEncoding,
    Workload, WorkloadError,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Customer {
    firstname: String,
    lastname: String,
}

fn recorder(seen: &Arc<Mutex<Vec<String>>>) -> impl Fn() -> Workload + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move || {
        let seen = Arc::clone(&seen);
        Workload::text(move |text: String, _: &Frame, address: &str, _: &mut ActorContext| {
            seen.lock().push(format!("{address}|{text}"));
            Ok(())
        })
    }
}

fn echo() -> Workload {
    Workload::text(|text: String, _: &Frame, _: &str, ctx: &mut ActorContext| Ok(ctx.reply_text(&text)?))
}

fn next_text(subscriber: &mut Subscriber, serializer: &Serializer) -> String {
    let frames = subscriber
        .recv_message_timeout(WAIT)
        .unwrap()
        .expect("no message before timeout");
    serializer.decode_string(&frames[1]).unwrap()
}

#[test]
fn test_simple_echo() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    silo.register_actor("echo", "XXXX", "reply.XXXX", Serializer::json(), echo)
        .unwrap();
    let mut replies = silo.subscriber().unwrap();
    replies.subscribe_to_prefix("reply.XXXX");
    silo.start().unwrap();

    let serializer = silo.serializer();
    silo.publisher()
        .send_multipart(encode_simple_message("XXXX", "hello its me", &serializer))
        .unwrap();
    assert_eq!(next_text(&mut replies, &serializer), "hello its me");

    silo.send_stop("XXXX").unwrap();
    assert!(silo.await_departures(WAIT));
    assert_eq!(silo.stop(), vec![("echo#1".to_string(), ActorExit::Stopped)]);
}

#[test]
fn test_echo_over_utf16_text() {
    let config = SiloConfig {
        text_encoding: TextEncoding::Utf16Le,
        ..SiloConfig::default()
    };
    let mut silo = Silo::new(config).unwrap();
    let serializer = silo.serializer();
    silo.register_actor("echo", "XXXX", "reply.XXXX", serializer, echo).unwrap();
    let mut replies = silo.subscriber().unwrap();
    replies.subscribe_to_prefix(serializer.encode_string("reply.XXXX"));
    silo.start().unwrap();

    silo.publisher()
        .send_multipart(encode_simple_message("XXXX", "grüße", &serializer))
        .unwrap();
    assert_eq!(next_text(&mut replies, &serializer), "grüße");
}

#[test]
fn test_typed_payload() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    let serializer = silo.serializer();
    let record = Arc::clone(&seen);
    silo.register_actor("customers", "XXXXxxxx", "reply.customers", serializer, move || {
        let record = Arc::clone(&record);
        Workload::typed(move |customer: Customer, _: &Frame, address: &str, _: &mut ActorContext| {
            record.lock().push((address.to_string(), customer));
            Ok(())
        })
    })
    .unwrap();
    silo.start().unwrap();

    let customer = Customer {
        firstname: "John".into(),
        lastname: "Wilson".into(),
    };
    silo.publisher()
        .send_multipart(encode_typed_message("XXXXxxxx", &customer, &serializer).unwrap())
        .unwrap();
    silo.send_stop("XXXXxxxx").unwrap();
    assert!(silo.await_departures(WAIT));

    assert_eq!(*seen.lock(), vec![("XXXXxxxx".to_string(), customer)]);
}

#[test]
fn test_subscription_filtering() {
    let hello = Arc::new(Mutex::new(Vec::new()));
    let all = Arc::new(Mutex::new(Vec::new()));
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    silo.register_actor("hello", "hello", "out.hello", Serializer::json(), recorder(&hello))
        .unwrap();
    silo.register_actor("all", "", "out.all", Serializer::json(), recorder(&all))
        .unwrap();
    silo.start().unwrap();

    let serializer = silo.serializer();
    let mut publisher = silo.publisher();
    publisher
        .send_multipart(encode_simple_message("Nothello", "a", &serializer))
        .unwrap();
    publisher
        .send_multipart(encode_simple_message("hello", "b", &serializer))
        .unwrap();
    // Reaches both: "hello" by prefix, the empty prefix by matching everything.
    silo.send_stop("hello").unwrap();
    assert!(silo.await_departures(WAIT));

    assert_eq!(*hello.lock(), vec!["hello|b"]);
    assert_eq!(*all.lock(), vec!["Nothello|a", "hello|b"]);
}

#[test]
fn test_counted_sequence_dispatches_exactly_once() {
    let inbound = Endpoint::bind("inproc://counted/in");
    let outbound = Endpoint::bind("inproc://counted/out");
    let serializer = Serializer::bincode();
    let mut actor = Actor::new(
        ActorConfig::new("counter#1", "XXXXxxxx", "reply").with_serializer(serializer),
        Workload::typed(|_: Customer, _: &Frame, _: &str, ctx: &mut ActorContext| {
            ctx.properties_mut().increment("invocations");
            Ok(())
        }),
        outbound.subscriber().unwrap(),
        inbound.publisher(),
    );

    let mut publisher = outbound.publisher();
    for i in 0..10 {
        let customer = Customer {
            firstname: format!("John{i}"),
            lastname: "Wilson".into(),
        };
        publisher
            .send_multipart(encode_typed_message("XXXXxxxx", &customer, &serializer).unwrap())
            .unwrap();
    }
    publisher.send_multipart(encode_stop("XXXXxxxx", &serializer)).unwrap();

    let actor = std::thread::spawn(move || {
        assert_eq!(actor.run(), ActorExit::Stopped);
        actor
    })
    .join()
    .unwrap();

    assert_eq!(actor.dispatched(), 10);
    assert_eq!(actor.context().properties().get_as::<i64>("invocations"), Some(10));
    assert!(!actor.is_running());
}

#[test]
fn test_relay_fidelity_through_silo() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    let mut raw = silo.subscriber().unwrap();
    raw.subscribe_all();
    silo.start().unwrap();

    let frames: Vec<Frame> = vec![
        Frame::from_static(b"raw"),
        Frame::from_static(&[0xff, 0x00, 0x7f]),
        Frame::new(),
        Frame::from(vec![42u8; 4096]),
    ];
    silo.publisher().send_multipart(frames.clone()).unwrap();
    assert_eq!(raw.recv_message_timeout(WAIT).unwrap().unwrap(), frames);
    assert_eq!(silo.pipe().messages_relayed(), 1);
}

#[test]
fn test_departures_are_counted() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    for name in ["a", "b", "c"] {
        silo.register_actor(name, name, "out", Serializer::json(), echo).unwrap();
    }
    silo.start().unwrap();
    assert_eq!(silo.live_actors(), 3);
    assert!(!silo.await_departures(Duration::from_millis(50)));

    silo.send_stop("a").unwrap();
    silo.send_stop("b").unwrap();
    silo.send_stop("c").unwrap();
    assert!(silo.await_departures(WAIT));
    assert_eq!(silo.live_actors(), 0);

    let exits = silo.stop();
    assert_eq!(exits.len(), 3);
    assert!(exits.iter().all(|(_, exit)| *exit == ActorExit::Stopped));
    assert!(silo.stop().is_empty());
}

#[test]
fn test_stop_closes_running_actors() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    silo.register_actor("idle", "idle", "out", Serializer::json(), echo).unwrap();
    silo.start().unwrap();

    assert_eq!(silo.stop(), vec![("idle#1".to_string(), ActorExit::Closed)]);
    assert!(matches!(silo.send_stop("idle"), Err(SiloError::Bus(_))));
}

#[test]
fn test_lifecycle_errors() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    silo.register_actor("echo", "echo", "out", Serializer::json(), echo).unwrap();
    assert!(matches!(silo.activate("echo"), Err(SiloError::NotRunning)));

    silo.start().unwrap();
    assert!(matches!(silo.start(), Err(SiloError::AlreadyStarted)));
    assert!(matches!(
        silo.register_actor("late", "late", "out", Serializer::json(), echo),
        Err(SiloError::AlreadyStarted)
    ));
    assert_eq!(silo.activate("echo").unwrap(), "echo#2");
    assert!(silo.activate("missing").is_err());
}

#[test]
fn test_monitor_records_actor_lifecycle() {
    let config = SiloConfig {
        monitor: true,
        ..SiloConfig::default()
    };
    let mut silo = Silo::new(config).unwrap();
    silo.register_actor("m", "m", "out", Serializer::json(), echo).unwrap();
    silo.start().unwrap();
    silo.send_stop("m").unwrap();
    assert!(silo.await_departures(WAIT));
    silo.stop();

    let lines = silo.monitor().unwrap().lines_for("m#1");
    assert_eq!(lines, vec![WAITING, RECEIVED, EXITING]);
}

#[tokio::test]
async fn test_scope_call_completes_with_result() {
    let add = MethodHandle::new("Calc", "add");
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    let handle = add.clone();
    silo.register_actor("calc", "calc", "out", Serializer::json(), move || {
        Workload::dispatch(OperationRegistry::new().with(handle.clone(), |_, args, ctx| {
            let token = silo_bus::token_arg(&args).ok_or_else(|| WorkloadError::BadArgument("token".into()))?;
            let sum: i64 = args[..args.len() - 1].iter().filter_map(Arg::as_i64).sum();
            ctx.complete(token, Completion::success(vec![Arg::Int(sum)]));
            Ok(())
        }))
    })
    .unwrap();
    silo.start().unwrap();

    let completion = tokio::time::timeout(WAIT, silo.scope().call("calc", &add, vec![2i64.into(), 3i64.into()]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completion.into_result().unwrap(), vec![Arg::Int(5)]);
    assert_eq!(silo.callbacks().pending(), 0);
}

#[tokio::test]
async fn test_workload_errors_reach_fault_listener() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    silo.register_actor("fragile", "fragile", "out", Serializer::json(), || {
        Workload::text(|text: String, _: &Frame, _: &str, _: &mut ActorContext| {
            Err(WorkloadError::Failed(format!("cannot handle {text}")))
        })
    })
    .unwrap();
    let mut faults = silo.take_faults().unwrap();
    silo.start().unwrap();

    let serializer = silo.serializer();
    silo.publisher()
        .send_multipart(encode_simple_message("fragile", "x", &serializer))
        .unwrap();
    let fault = tokio::time::timeout(WAIT, faults.recv()).await.unwrap().unwrap();
    assert_eq!(fault.actor, "fragile#1");
    assert_eq!(fault.completion.code, ResultCode::Fault);

    // The actor survived the fault and still answers the stop protocol.
    silo.send_stop("fragile").unwrap();
    let exits = tokio::task::spawn_blocking(move || {
        assert!(silo.await_departures(WAIT));
        silo.stop()
    })
    .await
    .unwrap();
    assert_eq!(exits[0].1, ActorExit::Stopped);
}

#[tokio::test]
async fn test_failed_calls_complete_with_fault() {
    let refuse = MethodHandle::new("Calc", "refuse");
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    let handle = refuse.clone();
    silo.register_actor("calc", "calc", "out", Serializer::json(), move || {
        Workload::dispatch(OperationRegistry::new().with(handle.clone(), |_, _, _| {
            Err(WorkloadError::BadArgument("no thanks".into()))
        }))
    })
    .unwrap();
    silo.start().unwrap();
    let scope = silo.scope();

    let refused = tokio::time::timeout(WAIT, scope.call("calc", &refuse, vec![1i64.into()]))
        .await
        .expect("refused call completes")
        .unwrap();
    assert_eq!(refused.code, ResultCode::Fault);
    assert!(refused.error.unwrap().contains("no thanks"));

    let unknown = tokio::time::timeout(WAIT, scope.call("calc", &MethodHandle::new("Calc", "missing"), vec![]))
        .await
        .expect("unknown call completes")
        .unwrap();
    assert_eq!(unknown.code, ResultCode::Fault);
    assert_eq!(silo.callbacks().pending(), 0);
}

/// `invoke` as message text is plain data, not a truncated invocation.
#[test]
fn test_invoke_text_is_echoed() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    silo.register_actor("echo", "XXXX", "reply.XXXX", Serializer::json(), echo)
        .unwrap();
    let mut replies = silo.subscriber().unwrap();
    replies.subscribe_to_prefix("reply.XXXX");
    silo.start().unwrap();

    let serializer = silo.serializer();
    let mut publisher = silo.publisher();
    for text in ["hello", "invoke", "after"] {
        publisher
            .send_multipart(encode_simple_message("XXXX", text, &serializer))
            .unwrap();
    }
    assert_eq!(next_text(&mut replies, &serializer), "hello");
    assert_eq!(next_text(&mut replies, &serializer), "invoke");
    assert_eq!(next_text(&mut replies, &serializer), "after");
}

/// Stop and departure frames use the silo's text encoding, so every
/// blueprint must share it.
#[test]
fn test_mixed_text_encoding_is_rejected() {
    let mut silo = Silo::new(SiloConfig::default()).unwrap();
    let wide = Serializer::json().with_text_encoding(TextEncoding::Utf16Le);
    let err = silo.register_actor("w", "wide", "reply.wide", wide, echo).unwrap_err();
    assert!(matches!(
        err,
        SiloError::TextEncodingMismatch {
            expected: TextEncoding::Utf8,
            found: TextEncoding::Utf16Le,
            ..
        }
    ));
    assert_eq!(silo.factory().blueprints().count(), 0);

    let narrow = silo.serializer();
    silo.register_actor("w", "wide", "reply.wide", narrow, echo).unwrap();
    silo.start().unwrap();
    silo.send_stop("wide").unwrap();
    assert!(silo.await_departures(WAIT));
    assert_eq!(silo.stop(), vec![("w#1".to_string(), ActorExit::Stopped)]);
}
