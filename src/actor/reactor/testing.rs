use super::*;
use crate::actor::Receiver;

/// Stands in for the compositor backend: collects what the reactor asks for
/// and turns configures into acknowledgements.
pub struct Backend {
    rx: Receiver<Request>,
}

impl Backend {
    pub fn requests(&mut self) -> Vec<Request> {
        let mut requests = Vec::new();
        while let Ok((_span, request)) = self.rx.try_recv() {
            requests.push(request);
        }
        requests
    }
}

impl Reactor {
    pub fn new_for_test() -> (Reactor, Backend) { Self::new_for_test_with(Config::default()) }

    pub fn new_for_test_with(config: Config) -> (Reactor, Backend) {
        let (tx, rx) = actor::channel();
        (Reactor::new(config, Record::none(), tx), Backend { rx })
    }

    pub fn view_of(&self, surface: u64) -> NodeId { self.surfaces[&SurfaceId(surface)] }
}

pub fn output_added(name: &str, width: f64, height: f64) -> Event {
    Event::OutputAdded {
        name: name.to_owned(),
        rect: Rect::new(0.0, 0.0, width, height),
    }
}

pub fn mapped(surface: u64) -> Event {
    Event::ViewMapped {
        surface: SurfaceId(surface),
        title: format!("window {surface}"),
        app_id: None,
        natural: Size::new(400.0, 300.0),
        floating: false,
    }
}

pub fn unmapped(surface: u64) -> Event { Event::ViewUnmapped { surface: SurfaceId(surface) } }

pub fn command(command: Command) -> Event { Event::Command { seat: None, command } }

pub fn layout(cmd: LayoutCommand) -> Event { command(Command::Layout(cmd)) }

pub fn configures(requests: &[Request]) -> Vec<(SurfaceId, ConfigureSerial, Size)> {
    requests
        .iter()
        .filter_map(|r| match *r {
            Request::Configure { surface, serial, size } => Some((surface, serial, size)),
            _ => None,
        })
        .collect()
}

/// The acknowledgement a well-behaved client sends for each configure.
pub fn acks(requests: &[Request]) -> Vec<Event> {
    configures(requests)
        .into_iter()
        .map(|(surface, serial, size)| Event::ConfigureAck { surface, serial: Some(serial), size })
        .collect()
}

pub fn presents(requests: &[Request]) -> Vec<(String, Vec<(SurfaceId, Rect)>, bool)> {
    requests
        .iter()
        .filter_map(|r| match r {
            Request::Present { output, views, damaged, .. } => {
                Some((output.clone(), views.clone(), *damaged))
            }
            _ => None,
        })
        .collect()
}

pub fn visibility(requests: &[Request]) -> Vec<(SurfaceId, bool)> {
    requests
        .iter()
        .filter_map(|r| match *r {
            Request::SetVisible { surface, visible } => Some((surface, visible)),
            _ => None,
        })
        .collect()
}

pub fn activations(requests: &[Request]) -> Vec<(SurfaceId, bool)> {
    requests
        .iter()
        .filter_map(|r| match *r {
            Request::SetActivated { surface, activated } => Some((surface, activated)),
            _ => None,
        })
        .collect()
}

/// Handles `event` at `now` and acknowledges every configure it caused.
pub fn settle(reactor: &mut Reactor, backend: &mut Backend, event: Event, now: Instant) -> Vec<Request> {
    reactor.handle_event_at(event, now);
    let mut requests = backend.requests();
    for ack in acks(&requests) {
        reactor.handle_event_at(ack, now);
        requests.extend(backend.requests());
    }
    requests
}
