//! Two coordinators complete an audio call through one in-memory
//! signal channel.
//!
//! Run with: cargo run --example two_member_call

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;

use membercall_client_core::{
    AlwaysGranted, CallCoordinator, CallEvent, CoordinatorConfig, MemberId,
};
use membercall_media_core::{MediaConfig, MediaSessionManager, SyntheticCapture};
use membercall_signal_core::{CallType, InMemorySignalChannel, SignalChannel};

fn coordinator(id: &str, channel: Arc<dyn SignalChannel>) -> Arc<CallCoordinator> {
    let media = Arc::new(MediaSessionManager::new(
        MediaConfig::default(),
        SyntheticCapture::new(),
    ));
    CallCoordinator::new(
        MemberId::new(id),
        channel,
        media,
        AlwaysGranted::new(),
        CoordinatorConfig::default(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let channel = InMemorySignalChannel::new();
    let alice = coordinator("alice", channel.clone());
    let bob = coordinator("bob", channel.clone());

    alice.start().await?;
    bob.start().await?;

    let mut bob_events = bob.subscribe_events();

    println!("alice calls bob (audio)...");
    let call_id = alice
        .initiate_call(MemberId::new("bob"), CallType::Audio)
        .await?;
    println!("alice: call {call_id} ringing");

    // Bob waits for the ring and answers.
    while let Some(Ok(event)) = bob_events.next().await {
        if let CallEvent::IncomingCall { call } = event {
            println!("bob: incoming {} call from {}", call.call_type.as_str(), call.caller_id);
            bob.answer_call(call.call_id).await?;
            break;
        }
    }

    // Give the answer record time to reach alice and ICE time to run.
    tokio::time::sleep(Duration::from_secs(2)).await;

    if let Some(call) = alice.active_call().await {
        println!(
            "alice: call {} is {} (started at {:?})",
            call.call_id,
            call.status.as_str(),
            call.started_at
        );
    }
    println!(
        "alice: muted={} speaker={}",
        alice.toggle_mute().await,
        alice.toggle_speaker().await
    );

    println!("alice hangs up");
    alice.end_call().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("signal trail:");
    for record in channel.records().await {
        println!(
            "  {} {} -> {} [{}]",
            record.signal.kind(),
            record.caller_id,
            record.receiver_id,
            record.status.as_str()
        );
    }

    alice.stop().await;
    bob.stop().await;
    Ok(())
}
