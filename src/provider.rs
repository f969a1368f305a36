use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::predictor_client::Predictor;
use crate::store::{Delta, ProviderCommand};

// Each command is answered with exactly one `Delta::PredictionReady`, even
// when the predictor panics. The thread exits once either channel closes.
pub fn spawn_predictor_worker<P>(
    predictor: P,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> JoinHandle<()>
where
    P: Predictor + Send + 'static,
{
    thread::spawn(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::Predict { ticket, request } => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Predicting {} frame {}",
                        request.game_name, request.frame
                    )));
                    let outcome =
                        match panic::catch_unwind(AssertUnwindSafe(|| predictor.predict(&request)))
                        {
                            Ok(result) => result.map_err(|err| format!("{err:#}")),
                            Err(payload) => Err(format!(
                                "predictor panicked: {}",
                                panic_message(payload.as_ref())
                            )),
                        };
                    if tx
                        .send(Delta::PredictionReady { ticket, outcome })
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
