use crate::catalog::Catalog;
use crate::config::{Config, ConfigError, Store};
use crate::format;
use crate::messenger::Messenger;
use crate::model::{ButtonAction, Customer, Product};
use crate::orders::{OrderBook, OrderNotification, OrderState, PendingOrder};
use anyhow::Result;
use reqwest::Url;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use tracing::{error, info, instrument, warn};

/// Inbound message content the storefront distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    Text(&'a str),
    /// Phone number from a shared Telegram contact.
    Contact(&'a str),
    Other,
}

/// Conversation controller: routes inbound events to search and the order
/// flow, and renders replies through a `Messenger`.
pub struct Storefront {
    catalog: Arc<Catalog>,
    orders: OrderBook,
    messenger: Arc<dyn Messenger>,
    store: Store,
    payment_url: Url,
    max_results: usize,
}

impl Storefront {
    pub fn new(
        cfg: &Config,
        catalog: Arc<Catalog>,
        messenger: Arc<dyn Messenger>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            catalog,
            orders: OrderBook::new(cfg.app.pending_order_ttl()),
            messenger,
            store: cfg.store.clone(),
            payment_url: cfg.store.payment_url()?,
            max_results: cfg.app.max_results,
        })
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[instrument(skip_all, fields(user_id = customer.user_id))]
    pub async fn on_message(&self, chat: ChatId, customer: &Customer, input: Inbound<'_>) -> Result<()> {
        match input {
            Inbound::Text(text) => self.on_text(chat, customer, text).await,
            Inbound::Contact(phone) => {
                match self.orders.take(customer.user_id).await {
                    Some(order) => self.submit_phone(chat, customer, order, phone).await,
                    None => self.send(chat, &format::help(&self.store), None).await,
                }
            }
            Inbound::Other => {
                let reply = match self.orders.state(customer.user_id).await {
                    OrderState::AwaitingPhone(_) => format::ASK_PHONE.to_string(),
                    OrderState::Idle => format::welcome(&self.store),
                };
                self.send(chat, &reply, None).await
            }
        }
    }

    async fn on_text(&self, chat: ChatId, customer: &Customer, text: &str) -> Result<()> {
        let trimmed = text.trim();

        // Commands are never taken as a phone number or a search query.
        if let Some(command) = parse_command(trimmed) {
            return self.on_command(chat, customer, command).await;
        }

        if trimmed.is_empty() {
            let reply = match self.orders.state(customer.user_id).await {
                OrderState::AwaitingPhone(_) => format::ASK_PHONE,
                OrderState::Idle => format::NOT_FOUND,
            };
            return self.send(chat, reply, None).await;
        }

        // A pending order consumes the text, whatever it is.
        if let Some(order) = self.orders.take(customer.user_id).await {
            return self.submit_phone(chat, customer, order, trimmed).await;
        }

        self.search(chat, trimmed).await
    }

    async fn on_command(&self, chat: ChatId, customer: &Customer, command: &str) -> Result<()> {
        match command {
            "start" => self.send(chat, &format::welcome(&self.store), None).await,
            "help" => self.send(chat, &format::help(&self.store), None).await,
            "cancel" => {
                let reply = if self.orders.cancel(customer.user_id).await {
                    info!(user_id = customer.user_id, "pending order cancelled");
                    format::CANCELLED
                } else {
                    format::NOTHING_TO_CANCEL
                };
                self.send(chat, reply, None).await
            }
            _ => self.send(chat, format::UNKNOWN_COMMAND, None).await,
        }
    }

    async fn search(&self, chat: ChatId, query: &str) -> Result<()> {
        let results = self.catalog.search(query);
        info!(query, matches = results.len(), "search");
        if results.is_empty() {
            return self.send(chat, format::NOT_FOUND, None).await;
        }
        for product in results.iter().take(self.max_results) {
            self.present_product(chat, product).await?;
        }
        if results.len() > self.max_results {
            self.send(chat, &format::too_many_results(results.len(), self.max_results), None)
                .await?;
        }
        Ok(())
    }

    /// Photo card when the product has a remote image, text card otherwise
    /// or when the photo cannot be delivered.
    async fn present_product(&self, chat: ChatId, product: &Product) -> Result<()> {
        let caption = format::product_card(product, &self.store.currency);
        let keyboard = format::product_keyboard(product.id);
        if let Some(photo) = format::image_url(product) {
            match self
                .messenger
                .send_photo(chat, photo, &caption, Some(keyboard.clone()))
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(?err, product_id = product.id, "photo delivery failed; sending text card")
                }
            }
        }
        self.send(chat, &caption, Some(keyboard)).await
    }

    async fn submit_phone(
        &self,
        chat: ChatId,
        customer: &Customer,
        order: PendingOrder,
        phone: &str,
    ) -> Result<()> {
        let Some(product) = self.catalog.get(order.product_id) else {
            error!(
                user_id = customer.user_id,
                product_id = order.product_id,
                "pending order references a product missing from the catalog"
            );
            return self.send(chat, format::SEARCH_AGAIN, None).await;
        };

        let notification = OrderNotification::compose(product, customer, phone);
        info!(
            reference = %notification.reference,
            user_id = customer.user_id,
            product_id = product.id,
            "order submitted"
        );
        let admin_text = format::admin_notification(&notification, &self.store.currency);
        if let Err(err) = self.messenger.notify_admin(&admin_text).await {
            error!(?err, reference = %notification.reference, "failed to notify admin of order");
        }

        self.send(chat, &format::order_received(&notification), None).await
    }

    /// Handle an inline keyboard press. `message` is the message carrying the
    /// keyboard, when Telegram still provides it.
    #[instrument(skip_all, fields(user_id = customer.user_id))]
    pub async fn on_button(
        &self,
        chat: ChatId,
        message: Option<MessageId>,
        customer: &Customer,
        query_id: &str,
        data: Option<&str>,
    ) -> Result<()> {
        if let Err(err) = self.messenger.answer_button(query_id).await {
            warn!(?err, "failed to answer callback query");
        }

        let action = match data.map(str::parse::<ButtonAction>) {
            Some(Ok(action)) => action,
            Some(Err(err)) => {
                warn!(%err, "ignoring button with unknown token");
                return self.send(chat, format::SEARCH_AGAIN, None).await;
            }
            None => return Ok(()),
        };

        match action {
            ButtonAction::Buy(product_id) => match self.catalog.get(product_id) {
                Some(product) => {
                    let text = format::purchase_menu(product, &self.store.currency);
                    let keyboard = format::purchase_keyboard(product_id, &self.payment_url);
                    self.replace_or_send(chat, message, &text, Some(keyboard)).await
                }
                None => {
                    warn!(product_id, "buy pressed for unknown product");
                    self.send(chat, format::SEARCH_AGAIN, None).await
                }
            },
            ButtonAction::SendPhone(product_id) => {
                match self.orders.select(&self.catalog, customer.user_id, product_id).await {
                    Ok(_) => self.replace_or_send(chat, message, format::ASK_PHONE, None).await,
                    Err(err) => {
                        warn!(%err, "cannot start order");
                        self.send(chat, format::SEARCH_AGAIN, None).await
                    }
                }
            }
            ButtonAction::Support => self.send(chat, &format::support(&self.store), None).await,
        }
    }

    /// Edit the keyboard's message in place. Photo cards have no text to edit,
    /// so a failed edit becomes a new message.
    async fn replace_or_send(
        &self,
        chat: ChatId,
        message: Option<MessageId>,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        if let Some(message) = message {
            match self.messenger.edit_text(chat, message, text, keyboard.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => warn!(?err, "edit failed; sending a new message"),
            }
        }
        self.send(chat, text, keyboard).await
    }

    async fn send(&self, chat: ChatId, text: &str, keyboard: Option<InlineKeyboardMarkup>) -> Result<()> {
        self.messenger.send_text(chat, text, keyboard).await?;
        Ok(())
    }
}

/// `/start`, `/start@shop_bot payload` -> `start`. None for plain text.
fn parse_command(text: &str) -> Option<&str> {
    let head = text.strip_prefix('/')?.split_whitespace().next()?;
    let name = head.split('@').next().unwrap_or(head);
    (!name.is_empty()).then_some(name)
}

/// Dispatcher endpoint for private-chat messages.
pub async fn handle_message(shop: Arc<Storefront>, msg: Message) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let customer = Customer::from_telegram(user);
    let input = if let Some(text) = msg.text() {
        Inbound::Text(text)
    } else if let Some(contact) = msg.contact() {
        Inbound::Contact(&contact.phone_number)
    } else {
        Inbound::Other
    };
    if let Err(err) = shop.on_message(msg.chat.id, &customer, input).await {
        error!(?err, "failed to handle message");
    }
    Ok(())
}

/// Dispatcher endpoint for inline keyboard presses.
pub async fn handle_callback(shop: Arc<Storefront>, q: CallbackQuery) -> ResponseResult<()> {
    let customer = Customer::from_telegram(&q.from);
    let (chat, message) = match &q.message {
        Some(msg) => (msg.chat.id, Some(msg.id)),
        None => (ChatId(q.from.id.0 as i64), None),
    };
    if let Err(err) = shop
        .on_button(chat, message, &customer, &q.id, q.data.as_deref())
        .await
    {
        error!(?err, "failed to handle button");
    }
    Ok(())
}
