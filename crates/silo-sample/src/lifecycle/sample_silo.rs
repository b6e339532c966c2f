use crate::clients::CustomerClient;
use crate::reader_actor::{LineWriter, MemoryWriter, SharedLines, WRITER_INSTANCE};
use crate::{customer_actor, echo_actor, hex_actor, reader_actor};
use silo_bus::frame::encode_simple_message;
use silo_bus::{ActorExit, Arg, FactoryError, Silo, SiloConfig, SiloError, Store, Subscriber};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const ECHO_ADDRESS: &str = "XXXX";
pub const ECHO_REPLY: &str = "reply.XXXX";
pub const HEX_ADDRESS: &str = "hex";
pub const HEX_REPLY: &str = "reply.hex";
pub const CUSTOMER_ADDRESS: &str = "customers";
pub const CUSTOMER_REPLY: &str = "reply.customers";
pub const LINES_ADDRESS: &str = "lines";
pub const LINES_REPLY: &str = "reply.lines";

/// How long [`SampleSilo::shutdown`] waits for departures before closing the pipe.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const ADDRESSES: [&str; 4] = [ECHO_ADDRESS, HEX_ADDRESS, CUSTOMER_ADDRESS, LINES_ADDRESS];

/// The sample silo: echo, hex validator, customer store and reader, wired and started.
pub struct SampleSilo {
    silo: Silo,
    lines: SharedLines,
    pub customer_client: CustomerClient,
}

impl SampleSilo {
    pub fn new(config: SiloConfig, store: Arc<dyn Store>) -> Result<Self, SiloError> {
        let mut silo = Silo::new(config)?;
        let serializer = silo.serializer();
        let lines = SharedLines::default();

        silo.register_actor("echo", ECHO_ADDRESS, ECHO_REPLY, serializer, echo_actor::workload)?;
        silo.register_actor("hex", HEX_ADDRESS, HEX_REPLY, serializer, hex_actor::workload)?;
        silo.register_actor("customers", CUSTOMER_ADDRESS, CUSTOMER_REPLY, serializer, move || {
            customer_actor::workload(Arc::clone(&store))
        })?;
        silo.register_actor("reader", LINES_ADDRESS, LINES_REPLY, serializer, reader_actor::workload)?;

        let sink = Arc::clone(&lines);
        silo.register_instance::<dyn LineWriter, _>(WRITER_INSTANCE, move |args| {
            let owner = args
                .first()
                .and_then(Arg::as_str)
                .ok_or_else(|| FactoryError::Construction {
                    name: WRITER_INSTANCE.to_string(),
                    reason: "missing owner argument".to_string(),
                })?;
            let writer: Box<dyn LineWriter> = Box::new(MemoryWriter::new(owner, Arc::clone(&sink)));
            Ok(writer)
        })?;

        silo.start()?;
        let customer_client = CustomerClient::new(silo.scope(), CUSTOMER_ADDRESS);
        info!(silo = %silo.name(), "Sample silo running");

        Ok(Self {
            silo,
            lines,
            customer_client,
        })
    }

    /// A sample silo with the default config and an in-memory store.
    pub fn in_memory() -> Result<Self, SiloError> {
        Self::new(SiloConfig::default(), Arc::new(customer_actor::MemoryStore::new()))
    }

    pub fn silo(&self) -> &Silo {
        &self.silo
    }

    /// Subscribes to replies on `address`. Subscribe before sending.
    pub fn replies(&self, address: &str) -> Result<Subscriber, SiloError> {
        let mut subscriber = self.silo.subscriber()?;
        subscriber.subscribe_to_prefix(self.silo.serializer().encode_string(address));
        Ok(subscriber)
    }

    /// Publishes a simple text message.
    pub fn say(&self, address: &str, text: &str) -> Result<(), SiloError> {
        let frames = encode_simple_message(address, text, &self.silo.serializer());
        Ok(self.silo.publisher().send_multipart(frames)?)
    }

    /// Everything the reader's writers have written so far.
    pub fn written_lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Stops every actor through the stop protocol, then closes the pipe.
    pub fn shutdown(mut self) -> Vec<(String, ActorExit)> {
        for address in ADDRESSES {
            if let Err(e) = self.silo.send_stop(address) {
                warn!(address = %address, error = %e, "Stop not sent");
            }
        }
        if !self.silo.await_departures(SHUTDOWN_GRACE) {
            warn!(live = self.silo.live_actors(), "Actors still live after grace period");
        }
        self.silo.stop()
    }
}
