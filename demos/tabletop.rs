//! An in-memory tabletop served over fascia.
//!
//! The host owns a few spheres holding tokens; a token wraps either an
//! element stack (a card pile that may decay) or a situation (a verb that
//! runs a recipe for some time). A dedicated update thread ticks the clock
//! and drains the request queue, exactly like a game's main loop would.
//!
//! Run with:
//!   RUST_LOG=fascia=debug,tabletop=info cargo run --example tabletop [config.toml]
//!
//! Try:
//!   curl http://localhost:8081/api/spheres
//!   curl -X POST http://localhost:8081/api/spheres/tabletop/tokens \
//!        -d '{"payloadType":"ElementStack","elementId":"funds","quantity":3,"lifetimeRemaining":30}'
//!   curl -X POST http://localhost:8081/api/spheres/tabletop/tokens \
//!        -d '{"payloadType":"Situation","verbId":"work","recipeId":"work"}'
//!   curl 'http://localhost:8081/api/by-path/~/tabletop!t1'
//!   curl -X PUT 'http://localhost:8081/api/by-path/~/tabletop!t1' -d '{"quantity":5,"shrouded":true}'
//!   curl -X POST http://localhost:8081/api/situations/tabletop/t2/execute
//!   curl http://localhost:8081/api/time/events
//!   curl -X POST http://localhost:8081/api/time/events/beat -d '{"event":"Either"}'

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fascia::{
    Api, ApiError, Config, Controller, HostHandle, Json, JsonObject, JsonTranslator, Method, Params,
    Request, RouteDef, Router, Server, SetError, Status, Strategy, StrategyRegistry, Translatable,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(50);
const MAX_SPEED: f32 = 4.0;
const SETTLE_POLL: Duration = Duration::from_millis(10);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Recipes a situation can run, with their duration in seconds.
const RECIPES: &[(&str, f32)] = &[("work", 60.0), ("study", 30.0), ("dream", 45.0)];

fn recipe_duration(id: &str) -> Option<f32> {
    RECIPES.iter().find(|(r, _)| *r == id).map(|(_, d)| *d)
}

// ── Host model ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Sphere,
    Token,
    ElementStack,
    Situation,
}

#[derive(Clone, Debug)]
enum Object {
    Sphere(Sphere),
    Token(Token),
    ElementStack(ElementStack),
    Situation(Situation),
}

impl Translatable for Object {
    type Kind = Kind;

    fn kind(&self) -> Kind {
        match self {
            Object::Sphere(_) => Kind::Sphere,
            Object::Token(_) => Kind::Token,
            Object::ElementStack(_) => Kind::ElementStack,
            Object::Situation(_) => Kind::Situation,
        }
    }
}

#[derive(Clone, Debug)]
struct Sphere {
    id: String,
    /// Always `Object::Token`.
    tokens: Vec<Object>,
}

#[derive(Clone, Debug)]
struct Token {
    id: String,
    sphere_id: String,
    shrouded: bool,
    payload: Box<Object>,
}

impl Token {
    fn path(&self) -> String {
        format!("~/{}!{}", self.sphere_id, self.id)
    }

    fn payload_type(&self) -> &'static str {
        match *self.payload {
            Object::ElementStack(_) => "ElementStack",
            Object::Situation(_) => "Situation",
            Object::Sphere(_) | Object::Token(_) => "Unknown",
        }
    }

    fn payload_entity_id(&self) -> Option<String> {
        match &*self.payload {
            Object::ElementStack(s) => Some(s.element_id.clone()),
            Object::Situation(s) => Some(s.verb_id.clone()),
            Object::Sphere(_) | Object::Token(_) => None,
        }
    }

    fn quantity(&self) -> u32 {
        match &*self.payload {
            Object::ElementStack(s) => s.quantity,
            _ => 1,
        }
    }

    /// Advances the payload by `seconds`. Returns `false` once the token
    /// has decayed away.
    fn beat(&mut self, seconds: f32) -> bool {
        match self.payload.as_mut() {
            Object::ElementStack(stack) => match stack.lifetime.as_mut() {
                Some(remaining) => {
                    *remaining -= seconds;
                    *remaining > 0.0
                }
                None => true,
            },
            Object::Situation(situation) => {
                situation.beat(seconds);
                true
            }
            Object::Sphere(_) | Object::Token(_) => true,
        }
    }
}

#[derive(Clone, Debug)]
struct ElementStack {
    element_id: String,
    quantity: u32,
    /// `None` for stacks that never decay.
    lifetime: Option<f32>,
    mutations: BTreeMap<String, i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
enum SituationState {
    Unstarted,
    Ongoing,
    Complete,
}

#[derive(Clone, Debug)]
struct Situation {
    verb_id: String,
    recipe_id: Option<String>,
    state: SituationState,
    time_remaining: Option<f32>,
    open: bool,
}

impl Situation {
    fn beat(&mut self, seconds: f32) {
        if self.state != SituationState::Ongoing {
            return;
        }
        if let Some(remaining) = self.time_remaining.as_mut() {
            *remaining -= seconds;
            if *remaining <= 0.0 {
                self.state = SituationState::Complete;
                self.time_remaining = None;
            }
        }
    }
}

fn as_sphere(o: &Object) -> Option<&Sphere> {
    match o { Object::Sphere(s) => Some(s), _ => None }
}
fn as_sphere_mut(o: &mut Object) -> Option<&mut Sphere> {
    match o { Object::Sphere(s) => Some(s), _ => None }
}
fn as_token(o: &Object) -> Option<&Token> {
    match o { Object::Token(t) => Some(t), _ => None }
}
fn as_token_mut(o: &mut Object) -> Option<&mut Token> {
    match o { Object::Token(t) => Some(t), _ => None }
}
fn as_stack(o: &Object) -> Option<&ElementStack> {
    match o { Object::ElementStack(s) => Some(s), _ => None }
}
fn as_stack_mut(o: &mut Object) -> Option<&mut ElementStack> {
    match o { Object::ElementStack(s) => Some(s), _ => None }
}
fn as_situation(o: &Object) -> Option<&Situation> {
    match o { Object::Situation(s) => Some(s), _ => None }
}
fn as_situation_mut(o: &mut Object) -> Option<&mut Situation> {
    match o { Object::Situation(s) => Some(s), _ => None }
}

/// The whole host state. Only ever touched from the update thread.
struct Tabletop {
    speed: f32,
    /// Seconds queued by `POST api/time/beat`, applied on the next tick.
    fixed_beat: f32,
    next_token: u64,
    /// Always `Object::Sphere`.
    spheres: Vec<Object>,
}

impl Tabletop {
    fn new() -> Self {
        let spheres = ["tabletop", "portage"]
            .into_iter()
            .map(|id| Object::Sphere(Sphere { id: id.to_owned(), tokens: Vec::new() }))
            .collect();
        Self { speed: 1.0, fixed_beat: 0.0, next_token: 1, spheres }
    }

    /// One update of the host loop.
    fn tick(&mut self, dt: f32) {
        let elapsed = dt * self.speed + std::mem::take(&mut self.fixed_beat);
        if elapsed > 0.0 {
            self.beat(elapsed);
        }
    }

    fn beat(&mut self, seconds: f32) {
        for sphere in self.spheres.iter_mut().filter_map(as_sphere_mut) {
            sphere.tokens.retain_mut(|o| as_token_mut(o).is_none_or(|t| t.beat(seconds)));
        }
    }

    fn payloads(&self) -> impl Iterator<Item = &Object> {
        self.spheres
            .iter()
            .filter_map(as_sphere)
            .flat_map(|s| s.tokens.iter().filter_map(as_token))
            .map(|t| t.payload.as_ref())
    }

    fn next_card_time(&self) -> Option<f32> {
        self.payloads()
            .filter_map(as_stack)
            .filter_map(|s| s.lifetime)
            .reduce(f32::min)
    }

    fn next_verb_time(&self) -> Option<f32> {
        self.payloads()
            .filter_map(as_situation)
            .filter(|s| s.state == SituationState::Ongoing)
            .filter_map(|s| s.time_remaining)
            .reduce(f32::min)
    }

    fn sphere(&self, id: &str) -> Result<&Object, ApiError> {
        self.spheres
            .iter()
            .find(|o| as_sphere(o).is_some_and(|s| s.id == id))
            .ok_or_else(|| sphere_not_found(id))
    }

    fn sphere_mut(&mut self, id: &str) -> Result<&mut Sphere, ApiError> {
        self.spheres
            .iter_mut()
            .filter_map(as_sphere_mut)
            .find(|s| s.id == id)
            .ok_or_else(|| sphere_not_found(id))
    }

    fn token(&self, sphere: &str, id: &str) -> Result<&Object, ApiError> {
        let sphere = self.sphere(sphere).and_then(|o| as_sphere(o).ok_or_else(|| sphere_not_found(sphere)))?;
        sphere
            .tokens
            .iter()
            .find(|o| as_token(o).is_some_and(|t| t.id == id))
            .ok_or_else(|| token_not_found(&sphere.id, id))
    }

    fn token_mut(&mut self, sphere: &str, id: &str) -> Result<&mut Object, ApiError> {
        self.sphere_mut(sphere)?
            .tokens
            .iter_mut()
            .find(|o| as_token(o).is_some_and(|t| t.id == id))
            .ok_or_else(|| token_not_found(sphere, id))
    }

    fn situation_mut(&mut self, sphere: &str, id: &str) -> Result<&mut Situation, ApiError> {
        as_token_mut(self.token_mut(sphere, id)?)
            .and_then(|t| as_situation_mut(&mut t.payload))
            .ok_or_else(|| ApiError::not_found(format!("No situation found at path \"~/{sphere}!{id}\".")))
    }

    fn create_token(&mut self, sphere_id: &str, new: NewToken) -> Result<&Object, ApiError> {
        let id = format!("t{}", self.next_token);
        self.next_token += 1;

        let payload = match new {
            NewToken::ElementStack { element_id, quantity, lifetime_remaining, mutations } => {
                Object::ElementStack(ElementStack { element_id, quantity, lifetime: lifetime_remaining, mutations })
            }
            NewToken::Situation { verb_id, recipe_id } => Object::Situation(Situation {
                verb_id,
                recipe_id,
                state: SituationState::Unstarted,
                time_remaining: None,
                open: false,
            }),
        };
        info!(sphere = sphere_id, token = %id, "token created");

        let sphere = self.sphere_mut(sphere_id)?;
        sphere.tokens.push(Object::Token(Token {
            id,
            sphere_id: sphere.id.clone(),
            shrouded: false,
            payload: Box::new(payload),
        }));
        sphere.tokens.last().ok_or_else(|| ApiError::internal("token vanished after creation"))
    }
}

fn sphere_not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("No sphere found at path \"~/{id}\"."))
}

fn token_not_found(sphere: &str, id: &str) -> ApiError {
    ApiError::not_found(format!("No token found at path \"~/{sphere}!{id}\"."))
}

/// Splits `~/sphere` or `~/sphere!token`.
fn parse_path(path: &str) -> Result<(&str, Option<&str>), ApiError> {
    let rest = path
        .strip_prefix("~/")
        .ok_or_else(|| ApiError::bad_request(format!("Path \"{path}\" must be absolute (start with ~/).")))?;
    Ok(match rest.split_once('!') {
        Some((sphere, token)) => (sphere, Some(token)),
        None => (rest, None),
    })
}

// ── Translation strategies ────────────────────────────────────────────────────

fn strategies() -> Vec<Strategy<Object>> {
    vec![
        Strategy::builder(Kind::Sphere, as_sphere, as_sphere_mut)
            .get("id", |s: &Sphere| s.id.clone())
            .get("path", |s: &Sphere| format!("~/{}", s.id))
            .get("tokenCount", |s: &Sphere| s.tokens.len())
            .build(),
        Strategy::builder(Kind::Token, as_token, as_token_mut)
            .get("id", |t: &Token| t.id.clone())
            .get("path", Token::path)
            .get("sphereId", |t: &Token| t.sphere_id.clone())
            .get("payloadType", Token::payload_type)
            .get("payloadEntityId", Token::payload_entity_id)
            .get("quantity", Token::quantity)
            .get("shrouded", |t: &Token| t.shrouded)
            .set("shrouded", |t: &mut Token, shrouded: bool| {
                t.shrouded = shrouded;
                Ok(())
            })
            .build(),
        Strategy::builder(Kind::ElementStack, as_stack, as_stack_mut)
            .get("elementId", |s: &ElementStack| s.element_id.clone())
            .get("quantity", |s: &ElementStack| s.quantity)
            .get("decays", |s: &ElementStack| s.lifetime.is_some())
            .get("lifetimeRemaining", |s: &ElementStack| s.lifetime)
            .get("mutations", |s: &ElementStack| s.mutations.clone())
            .set("quantity", |s: &mut ElementStack, quantity: u32| {
                if quantity == 0 {
                    return Err(SetError::invalid("quantity must be greater than 0"));
                }
                s.quantity = quantity;
                Ok(())
            })
            .set("mutations", |s: &mut ElementStack, mutations: BTreeMap<String, i32>| {
                for (aspect, level) in mutations {
                    if level == 0 {
                        s.mutations.remove(&aspect);
                    } else {
                        s.mutations.insert(aspect, level);
                    }
                }
                Ok(())
            })
            .build(),
        Strategy::builder(Kind::Situation, as_situation, as_situation_mut)
            .get("verbId", |s: &Situation| s.verb_id.clone())
            .get("recipeId", |s: &Situation| s.recipe_id.clone())
            .get("state", |s: &Situation| s.state)
            .get("timeRemaining", |s: &Situation| s.time_remaining)
            .get("open", |s: &Situation| s.open)
            .set("recipeId", |s: &mut Situation, recipe: Option<String>| {
                if s.state == SituationState::Ongoing {
                    return Err(SetError::conflict(format!("Situation {} is running a recipe.", s.verb_id)));
                }
                let recipe = recipe.filter(|r| !r.is_empty());
                if let Some(id) = &recipe {
                    if recipe_duration(id).is_none() {
                        return Err(SetError::invalid(format!("Recipe ID {id} not found.")));
                    }
                }
                s.recipe_id = recipe;
                s.state = SituationState::Unstarted;
                Ok(())
            })
            .set("open", |s: &mut Situation, open: bool| {
                s.open = open;
                Ok(())
            })
            .build(),
    ]
}

/// A token and its payload as one JSON object; payload properties win.
fn token_json(translator: &JsonTranslator<Object>, token: &Object) -> Result<JsonObject, ApiError> {
    let mut layers = vec![token];
    if let Some(t) = as_token(token) {
        if translator.has_strategy_for(&t.payload) {
            layers.push(t.payload.as_ref());
        } else {
            trace!(payload = ?t.payload.kind(), "no strategy for token payload");
        }
    }
    Ok(translator.to_json_composite(&layers)?)
}

/// Applies `body` to a token and its payload, or to neither.
fn update_token(translator: &JsonTranslator<Object>, body: &JsonObject, token: &mut Object) -> Result<(), ApiError> {
    let mut staged = token.clone();
    translator.from_json(body, &mut staged, false)?;
    if let Some(t) = as_token_mut(&mut staged) {
        if translator.has_strategy_for(&t.payload) {
            translator.from_json(body, &mut t.payload, false)?;
        }
    }
    *token = staged;
    Ok(())
}

// ── Controllers ───────────────────────────────────────────────────────────────

/// Adapts an `async fn(Arc<C>, Request, Params)` method into a route handler.
fn bind<C, F, Fut>(this: &Arc<C>, f: F) -> impl Fn(Request, Params) -> Fut + Send + Sync + 'static
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Request, Params) -> Fut + Send + Sync + 'static,
    Fut: Future,
{
    let this = Arc::clone(this);
    move |req, params| f(Arc::clone(&this), req, params)
}

struct TimeController {
    host: HostHandle<Tabletop>,
}

#[derive(Deserialize)]
struct SetSpeed {
    speed: f32,
}

#[derive(Deserialize)]
struct PassTime {
    seconds: f32,
}

#[derive(Clone, Copy, Deserialize)]
enum NextEvent {
    CardDecay,
    RecipeCompletion,
    Either,
}

#[derive(Deserialize)]
struct BeatNextEvent {
    event: NextEvent,
}

impl Controller for TimeController {
    fn base_path(&self) -> &str {
        "api/time"
    }

    fn routes(self: Arc<Self>) -> Vec<RouteDef> {
        vec![
            RouteDef::new(Method::Get, "speed", bind(&self, Self::get_speed)),
            RouteDef::new(Method::Post, "speed", bind(&self, Self::set_speed)),
            RouteDef::new(Method::Post, "beat", bind(&self, Self::beat)),
            RouteDef::new(Method::Get, "events", bind(&self, Self::next_events)),
            RouteDef::new(Method::Post, "events/beat", bind(&self, Self::beat_next_event)),
        ]
    }
}

impl TimeController {
    async fn get_speed(self: Arc<Self>, _: Request, _: Params) -> Result<Json<Value>, ApiError> {
        let speed = self.host.run(|t: &mut Tabletop| t.speed).await?;
        Ok(Json(json!({ "speed": speed })))
    }

    async fn set_speed(self: Arc<Self>, req: Request, _: Params) -> Result<Status, ApiError> {
        let SetSpeed { speed } = req.json()?;
        if !(0.0..=MAX_SPEED).contains(&speed) {
            return Err(ApiError::bad_request(format!("speed must be between 0 and {MAX_SPEED}")));
        }
        self.host.run(move |t: &mut Tabletop| t.speed = speed).await?;
        info!(speed, "speed changed");
        Ok(Status::Ok)
    }

    /// Queues a fixed beat and waits for the update loop to apply it.
    async fn beat(self: Arc<Self>, req: Request, _: Params) -> Result<Status, ApiError> {
        let PassTime { seconds } = req.json()?;
        if !(seconds > 0.0) {
            return Err(ApiError::bad_request("seconds must be greater than 0"));
        }
        self.host.run(move |t: &mut Tabletop| t.fixed_beat += seconds).await?;

        let settled = self.host.wait_until(|t: &Tabletop| t.fixed_beat == 0.0, SETTLE_POLL);
        tokio::time::timeout(SETTLE_TIMEOUT, settled)
            .await
            .map_err(|_| ApiError::internal("timed out waiting for the beat to apply"))??;
        Ok(Status::Ok)
    }

    async fn next_events(self: Arc<Self>, _: Request, _: Params) -> Result<Json<Value>, ApiError> {
        let (card, verb) = self.host.run(|t: &mut Tabletop| (t.next_card_time(), t.next_verb_time())).await?;
        Ok(Json(json!({ "nextCardTime": card, "nextVerbTime": verb })))
    }

    async fn beat_next_event(self: Arc<Self>, req: Request, _: Params) -> Result<Json<Value>, ApiError> {
        let BeatNextEvent { event } = req.json()?;
        let elapsed = self
            .host
            .try_run(move |t: &mut Tabletop| {
                let next = match event {
                    NextEvent::CardDecay => t.next_card_time(),
                    NextEvent::RecipeCompletion => t.next_verb_time(),
                    NextEvent::Either => [t.next_card_time(), t.next_verb_time()].into_iter().flatten().reduce(f32::min),
                };
                match next {
                    Some(seconds) if seconds > 0.0 => {
                        t.beat(seconds);
                        Ok(seconds)
                    }
                    _ => Err(ApiError::conflict("No events are available to jump to.")),
                }
            })
            .await?;
        Ok(Json(json!({ "secondsElapsed": elapsed })))
    }
}

#[derive(Deserialize)]
#[serde(tag = "payloadType", rename_all_fields = "camelCase")]
enum NewToken {
    ElementStack {
        element_id: String,
        #[serde(default = "one")]
        quantity: u32,
        #[serde(default)]
        lifetime_remaining: Option<f32>,
        #[serde(default)]
        mutations: BTreeMap<String, i32>,
    },
    Situation {
        verb_id: String,
        #[serde(default)]
        recipe_id: Option<String>,
    },
}

fn one() -> u32 {
    1
}

impl NewToken {
    fn parse(value: Value) -> Result<Self, ApiError> {
        let new: Self = serde_json::from_value(value).map_err(ApiError::MalformedBody)?;
        let problem = match &new {
            NewToken::ElementStack { quantity: 0, .. } => Some("quantity must be greater than 0".to_owned()),
            NewToken::ElementStack { lifetime_remaining: Some(l), .. } if *l <= 0.0 => {
                Some("lifetimeRemaining must be greater than 0".to_owned())
            }
            NewToken::Situation { recipe_id: Some(id), .. } if recipe_duration(id).is_none() => {
                Some(format!("Recipe ID {id} not found."))
            }
            _ => None,
        };
        match problem {
            Some(message) => Err(ApiError::bad_request(message)),
            None => Ok(new),
        }
    }
}

struct SpheresController {
    host: HostHandle<Tabletop>,
    translator: JsonTranslator<Object>,
}

impl Controller for SpheresController {
    fn base_path(&self) -> &str {
        "api/spheres"
    }

    fn routes(self: Arc<Self>) -> Vec<RouteDef> {
        vec![
            RouteDef::new(Method::Get, "~", bind(&self, Self::list_spheres)),
            RouteDef::new(Method::Get, ":sphere/tokens", bind(&self, Self::list_tokens)).param("sphere"),
            RouteDef::new(Method::Post, ":sphere/tokens", bind(&self, Self::create_tokens)).param("sphere"),
            RouteDef::new(Method::Delete, ":sphere/tokens", bind(&self, Self::clear_tokens)).param("sphere"),
        ]
    }
}

impl SpheresController {
    async fn list_spheres(self: Arc<Self>, _: Request, _: Params) -> Result<Json<Vec<JsonObject>>, ApiError> {
        let translator = self.translator.clone();
        let spheres = self
            .host
            .try_run(move |t: &mut Tabletop| {
                t.spheres
                    .iter()
                    .map(|s| translator.to_json(s).map_err(ApiError::from))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await?;
        Ok(Json(spheres))
    }

    /// Filters with the optional `payloadType` and `entityId` query params.
    async fn list_tokens(self: Arc<Self>, req: Request, p: Params) -> Result<Json<Vec<JsonObject>>, ApiError> {
        let sphere = p.arg(0).unwrap_or_default().to_owned();
        let payload_type = req.query("payloadType").map(str::to_owned);
        let entity_id = req.query("entityId").map(str::to_owned);
        let translator = self.translator.clone();

        let tokens = self
            .host
            .try_run(move |t: &mut Tabletop| {
                let Some(sphere) = as_sphere(t.sphere(&sphere)?) else {
                    return Err(sphere_not_found(&sphere));
                };
                sphere
                    .tokens
                    .iter()
                    .filter(|o| {
                        as_token(o).is_some_and(|t| {
                            payload_type.as_deref().is_none_or(|p| t.payload_type() == p)
                                && entity_id.as_deref().is_none_or(|e| t.payload_entity_id().as_deref() == Some(e))
                        })
                    })
                    .map(|o| token_json(&translator, o))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await?;
        Ok(Json(tokens))
    }

    /// Accepts one token object or an array of them. Every entry is
    /// validated before any token is created.
    async fn create_tokens(self: Arc<Self>, req: Request, p: Params) -> Result<(Status, Json<Value>), ApiError> {
        let sphere = p.arg(0).unwrap_or_default().to_owned();
        let (batch, single) = match req.json_value()? {
            Value::Array(items) => (items.into_iter().map(NewToken::parse).collect::<Result<Vec<_>, _>>()?, false),
            object @ Value::Object(_) => (vec![NewToken::parse(object)?], true),
            _ => return Err(ApiError::bad_request("Invalid request body, must be object or array.")),
        };
        let translator = self.translator.clone();

        let mut created = self
            .host
            .try_run(move |t: &mut Tabletop| {
                t.sphere(&sphere)?;
                batch
                    .into_iter()
                    .map(|new| {
                        let token = t.create_token(&sphere, new)?;
                        token_json(&translator, token).map(Value::Object)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .await?;

        let body = if single {
            created.pop().unwrap_or(Value::Null)
        } else {
            Value::Array(created)
        };
        Ok((Status::Created, Json(body)))
    }

    async fn clear_tokens(self: Arc<Self>, _: Request, p: Params) -> Result<Status, ApiError> {
        let sphere = p.arg(0).unwrap_or_default().to_owned();
        let removed = self
            .host
            .try_run(move |t: &mut Tabletop| {
                let sphere = t.sphere_mut(&sphere)?;
                let removed = sphere.tokens.len();
                sphere.tokens.clear();
                Ok(removed)
            })
            .await?;
        info!(removed, "sphere cleared");
        Ok(Status::Ok)
    }
}

struct SituationsController {
    host: HostHandle<Tabletop>,
}

impl Controller for SituationsController {
    fn base_path(&self) -> &str {
        "api/situations"
    }

    fn routes(self: Arc<Self>) -> Vec<RouteDef> {
        vec![
            RouteDef::new(Method::Post, ":sphere/:token/execute", bind(&self, Self::execute))
                .param("sphere")
                .param("token"),
            RouteDef::new(Method::Post, ":sphere/:token/conclude", bind(&self, Self::conclude))
                .param("sphere")
                .param("token"),
        ]
    }
}

impl SituationsController {
    fn target(p: &Params) -> (String, String) {
        (
            p.arg(0).unwrap_or_default().to_owned(),
            p.arg(1).unwrap_or_default().to_owned(),
        )
    }

    async fn execute(self: Arc<Self>, _: Request, p: Params) -> Result<Json<Value>, ApiError> {
        let (sphere, token) = Self::target(&p);
        let recipe = self
            .host
            .try_run(move |t: &mut Tabletop| {
                let situation = t.situation_mut(&sphere, &token)?;
                if situation.state != SituationState::Unstarted {
                    return Err(ApiError::conflict(format!(
                        "Situation {} is not in the correct state to begin a recipe.",
                        situation.verb_id
                    )));
                }
                let Some((recipe, duration)) = situation
                    .recipe_id
                    .as_deref()
                    .and_then(|r| recipe_duration(r).map(|d| (r.to_owned(), d)))
                else {
                    return Err(ApiError::conflict(format!(
                        "Situation {} could not begin its recipe.",
                        situation.verb_id
                    )));
                };
                situation.state = SituationState::Ongoing;
                situation.time_remaining = Some(duration);
                Ok(recipe)
            })
            .await?;
        Ok(Json(json!({ "executedRecipeId": recipe })))
    }

    async fn conclude(self: Arc<Self>, _: Request, p: Params) -> Result<Status, ApiError> {
        let (sphere, token) = Self::target(&p);
        self.host
            .try_run(move |t: &mut Tabletop| {
                let situation = t.situation_mut(&sphere, &token)?;
                if situation.state != SituationState::Complete {
                    return Err(ApiError::conflict(format!(
                        "Situation {} is not in the correct state to conclude.",
                        situation.verb_id
                    )));
                }
                situation.state = SituationState::Unstarted;
                situation.recipe_id = None;
                Ok(())
            })
            .await?;
        Ok(Status::Ok)
    }
}

struct ByPathController {
    host: HostHandle<Tabletop>,
    translator: JsonTranslator<Object>,
}

impl Controller for ByPathController {
    fn base_path(&self) -> &str {
        "api/by-path"
    }

    fn routes(self: Arc<Self>) -> Vec<RouteDef> {
        vec![
            RouteDef::new(Method::Get, "**path", bind(&self, Self::get_item)).param("path"),
            RouteDef::new(Method::Put, "**path", bind(&self, Self::update_item)).param("path"),
            RouteDef::new(Method::Delete, "**path", bind(&self, Self::delete_item)).param("path"),
        ]
    }
}

impl ByPathController {
    async fn get_item(self: Arc<Self>, _: Request, p: Params) -> Result<Json<JsonObject>, ApiError> {
        let path = p.arg(0).unwrap_or_default().to_owned();
        let translator = self.translator.clone();
        let item = self
            .host
            .try_run(move |t: &mut Tabletop| match parse_path(&path)? {
                (sphere, None) => Ok(translator.to_json(t.sphere(sphere)?)?),
                (sphere, Some(token)) => token_json(&translator, t.token(sphere, token)?),
            })
            .await?;
        Ok(Json(item))
    }

    async fn update_item(self: Arc<Self>, req: Request, p: Params) -> Result<Json<JsonObject>, ApiError> {
        let path = p.arg(0).unwrap_or_default().to_owned();
        let body = req.json_object()?;
        let translator = self.translator.clone();
        let item = self
            .host
            .try_run(move |t: &mut Tabletop| {
                let (sphere, Some(token)) = parse_path(&path)? else {
                    return Err(ApiError::bad_request("Cannot update a sphere."));
                };
                let token = t.token_mut(sphere, token)?;
                update_token(&translator, &body, token)?;
                token_json(&translator, token)
            })
            .await?;
        Ok(Json(item))
    }

    async fn delete_item(self: Arc<Self>, _: Request, p: Params) -> Result<Status, ApiError> {
        let path = p.arg(0).unwrap_or_default().to_owned();
        self.host
            .try_run(move |t: &mut Tabletop| {
                let (sphere, Some(token)) = parse_path(&path)? else {
                    return Err(ApiError::bad_request("Cannot delete a sphere."));
                };
                t.token_mut(sphere, token)?;
                t.sphere_mut(sphere)?
                    .tokens
                    .retain(|o| as_token(o).is_none_or(|t| t.id != token));
                Ok(())
            })
            .await?;
        Ok(Status::Ok)
    }
}

// ── Startup ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let translator = JsonTranslator::new(StrategyRegistry::load(strategies())?);
    let (host, mut queue) = fascia::host::channel::<Tabletop>();

    // The host's main loop: advance the clock, then serve queued requests.
    std::thread::Builder::new().name("tabletop-update".into()).spawn(move || {
        let mut table = Tabletop::new();
        loop {
            std::thread::sleep(TICK);
            table.tick(TICK.as_secs_f32());
            queue.pump(&mut table);
        }
    })?;

    let router = Router::new()
        .mount(Arc::new(TimeController { host: host.clone() }))?
        .mount(Arc::new(SpheresController { host: host.clone(), translator: translator.clone() }))?
        .mount(Arc::new(SituationsController { host: host.clone() }))?
        .mount(Arc::new(ByPathController { host, translator }))?;
    info!(routes = router.len(), "tabletop ready");

    Server::bind(config.listen_addr()?)
        .serve(Api::new(router).with_cors(config.cors))
        .await?;
    Ok(())
}
