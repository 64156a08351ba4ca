//! Prompt templates
//!
//! Built-in Russian phrasings keyed by situation. Each key maps to one or more
//! variants; placeholders use `{name}` syntax. A YAML file of the same shape
//! may override or extend individual keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::ConfigError;

/// Template keys referenced by the dialogue engine
pub mod keys {
    pub const GREETING: &str = "greeting";
    pub const GREETING_AGAIN: &str = "greeting_again";
    pub const HELP: &str = "help";
    pub const NOT_UNDERSTOOD: &str = "not_understood";
    pub const NOTHING_TO_REPEAT: &str = "nothing_to_repeat";
    pub const ANYTHING_ELSE: &str = "anything_else";

    pub const ORDER_INTRO: &str = "order_intro";
    pub const ORDER_ASK_NUMBER: &str = "order_ask_number";
    pub const ORDER_STATUS: &str = "order_status";
    pub const ORDER_ETA: &str = "order_eta";
    pub const ORDER_NOT_FOUND: &str = "order_not_found";
    pub const ORDER_LOOKUP_FAILED: &str = "order_lookup_failed";
    pub const ORDER_CANCEL_DENIED: &str = "order_cancel_denied";
    pub const ORDER_FOLLOWUP: &str = "order_followup";

    pub const SHIPPING_INTRO: &str = "shipping_intro";
    pub const SHIPPING_ASK_ADDRESS: &str = "shipping_ask_address";
    pub const SHIPPING_ADDRESS_NOT_FOUND: &str = "shipping_address_not_found";
    pub const SHIPPING_ADDRESS_CONFIRMED: &str = "shipping_address_confirmed";
    pub const SHIPPING_ASK_METHOD: &str = "shipping_ask_method";
    pub const SHIPPING_METHODS: &str = "shipping_methods";
    pub const SHIPPING_QUOTE: &str = "shipping_quote";
    pub const SHIPPING_QUOTE_UNAVAILABLE: &str = "shipping_quote_unavailable";
    pub const SHIPPING_CHANGE: &str = "shipping_change";

    pub const PAYMENT_INTRO: &str = "payment_intro";
    pub const PAYMENT_METHODS: &str = "payment_methods";
    pub const PAYMENT_PAID: &str = "payment_paid";
    pub const PAYMENT_UNPAID: &str = "payment_unpaid";
    pub const PAYMENT_ASK_ORDER: &str = "payment_ask_order";
    pub const PAYMENT_REFUND: &str = "payment_refund";

    pub const ESCALATION_OFFER: &str = "escalation_offer";
    pub const ESCALATION_TRANSFER: &str = "escalation_transfer";
    pub const ESCALATION_COMPLAINT: &str = "escalation_complaint";
    pub const ESCALATION_DECLINED: &str = "escalation_declined";
    pub const SPEECH_FAILURE: &str = "speech_failure";

    pub const GUARD_TURN_LIMIT: &str = "guard_turn_limit";
    pub const GUARD_TIME_LIMIT: &str = "guard_time_limit";
    pub const FAREWELL: &str = "farewell";
    pub const FAREWELL_NAMED: &str = "farewell_named";

    pub const SMS_QUOTE: &str = "sms_quote";
    pub const SMS_ORDER_STATUS: &str = "sms_order_status";
}

/// Key -> phrasings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PromptTemplates {
    templates: BTreeMap<String, Vec<String>>,
}

impl PromptTemplates {
    /// Built-in Russian catalog
    pub fn builtin() -> Self {
        let mut t = Self::default();

        t.insert(
            keys::GREETING,
            &[
                "Здравствуйте! Я виртуальный помощник магазина. Подскажу статус заказа, доставку или оплату. Что вас интересует?",
                "Добрый день! Я помогу с заказом, доставкой и оплатой. Чем могу помочь?",
                "Здравствуйте! Вы позвонили в службу поддержки магазина. Расскажите, с чем нужна помощь.",
            ],
        );
        t.insert(
            keys::GREETING_AGAIN,
            &["Хорошо. Чем ещё могу помочь?", "Давайте начнём сначала. Что вас интересует: заказ, доставка или оплата?"],
        );
        t.insert(
            keys::HELP,
            &["Я могу назвать статус заказа, рассчитать стоимость и срок доставки, рассказать о способах оплаты или соединить с оператором."],
        );
        t.insert(
            keys::NOT_UNDERSTOOD,
            &[
                "Извините, я не расслышала. Повторите, пожалуйста.",
                "Не совсем поняла вас. Скажите, пожалуйста, ещё раз.",
                "Простите, не разобрала. Вы спрашиваете о заказе, доставке или оплате?",
            ],
        );
        t.insert(keys::NOTHING_TO_REPEAT, &["Я пока ничего не говорила. Чем могу помочь?"]);
        t.insert(keys::ANYTHING_ELSE, &["Чем ещё могу помочь?", "Есть ли ещё вопросы?"]);

        t.insert(
            keys::ORDER_INTRO,
            &["Помогу с заказом. Назовите, пожалуйста, номер заказа.", "Давайте проверим заказ. Какой у него номер?"],
        );
        t.insert(
            keys::ORDER_ASK_NUMBER,
            &["Назовите, пожалуйста, номер заказа.", "Продиктуйте номер заказа, пожалуйста."],
        );
        t.insert(
            keys::ORDER_STATUS,
            &["Заказ номер {order_id} сейчас {status}.", "Ваш заказ {order_id} {status}."],
        );
        t.insert(keys::ORDER_ETA, &["Ожидаемая дата доставки: {eta}."]);
        t.insert(
            keys::ORDER_NOT_FOUND,
            &["Заказ с номером {order_id} не найден. Проверьте номер и назовите его ещё раз."],
        );
        t.insert(
            keys::ORDER_LOOKUP_FAILED,
            &["Сейчас не получается проверить заказ. Попробуйте чуть позже или попросите соединить с оператором."],
        );
        t.insert(
            keys::ORDER_CANCEL_DENIED,
            &["Заказ {order_id} уже {status}, отменить его по телефону нельзя."],
        );
        t.insert(
            keys::ORDER_FOLLOWUP,
            &["Могу рассказать о доставке или оплате этого заказа.", "Хотите узнать что-то ещё о доставке или оплате?"],
        );

        t.insert(
            keys::SHIPPING_INTRO,
            &["Давайте рассчитаем доставку. Назовите адрес: город, улицу и дом."],
        );
        t.insert(
            keys::SHIPPING_ASK_ADDRESS,
            &["Назовите, пожалуйста, адрес доставки: город, улицу и номер дома.", "Продиктуйте адрес доставки, пожалуйста."],
        );
        t.insert(
            keys::SHIPPING_ADDRESS_NOT_FOUND,
            &[
                "Не удалось распознать адрес. Повторите его, пожалуйста: город, улица, номер дома.",
                "Такой адрес не нашёлся. Назовите его ещё раз, начиная с города.",
            ],
        );
        t.insert(keys::SHIPPING_ADDRESS_CONFIRMED, &["Записала адрес: {address}."]);
        t.insert(
            keys::SHIPPING_ASK_METHOD,
            &["Как удобнее получить заказ: курьером, в пункт выдачи, почтой или экспресс-доставкой?"],
        );
        t.insert(
            keys::SHIPPING_METHODS,
            &["Мы доставляем курьером, в пункты выдачи, почтой и экспресс-доставкой."],
        );
        t.insert(
            keys::SHIPPING_QUOTE,
            &[
                "Доставка {method} обойдётся в {cost} рублей, срок {days} дней.",
                "Стоимость доставки {method} {cost} рублей, займёт {days} дней.",
            ],
        );
        t.insert(
            keys::SHIPPING_QUOTE_UNAVAILABLE,
            &["Сейчас не получается рассчитать точную стоимость доставки. Можем продолжить без расчёта, или я соединю вас с оператором."],
        );
        t.insert(keys::SHIPPING_CHANGE, &["Хорошо, назовите новый адрес доставки."]);

        t.insert(
            keys::PAYMENT_INTRO,
            &["Подскажу по оплате. Можно узнать способы оплаты или проверить, оплачен ли заказ."],
        );
        t.insert(
            keys::PAYMENT_METHODS,
            &["Оплатить можно картой, наличными при получении, онлайн на сайте, через ЮMoney или по QR-коду."],
        );
        t.insert(keys::PAYMENT_PAID, &["Заказ {order_id} оплачен, всё в порядке."]);
        t.insert(
            keys::PAYMENT_UNPAID,
            &["Заказ {order_id} ещё не оплачен. Сумма к оплате {total} рублей."],
        );
        t.insert(
            keys::PAYMENT_ASK_ORDER,
            &["Чтобы проверить оплату, назовите номер заказа."],
        );
        t.insert(
            keys::PAYMENT_REFUND,
            &["Деньги за отменённый или возвращённый заказ возвращаются тем же способом, которым вы платили, в течение десяти рабочих дней."],
        );

        t.insert(
            keys::ESCALATION_OFFER,
            &[
                "Похоже, я не могу помочь с этим сама. Соединить вас с оператором?",
                "Кажется, мы не понимаем друг друга. Перевести звонок на оператора?",
            ],
        );
        t.insert(
            keys::ESCALATION_TRANSFER,
            &["Соединяю с оператором. Пожалуйста, оставайтесь на линии.", "Перевожу звонок на специалиста. Оставайтесь на линии."],
        );
        t.insert(
            keys::ESCALATION_COMPLAINT,
            &["Понимаю ваше недовольство. Соединяю с менеджером, он разберётся."],
        );
        t.insert(keys::ESCALATION_DECLINED, &["Хорошо, продолжим. Что вас интересует: заказ, доставка или оплата?"]);
        t.insert(
            keys::SPEECH_FAILURE,
            &["Извините, возникли технические неполадки. Перевожу вас на оператора."],
        );

        t.insert(
            keys::GUARD_TURN_LIMIT,
            &["Мы говорим уже довольно долго, поэтому я завершаю звонок. Если вопросы останутся, перезвоните, пожалуйста. До свидания."],
        );
        t.insert(
            keys::GUARD_TIME_LIMIT,
            &["Время звонка истекло, поэтому я завершаю разговор. Спасибо за обращение, до свидания."],
        );
        t.insert(
            keys::FAREWELL,
            &["Спасибо за обращение! До свидания.", "Всего доброго! Хорошего дня."],
        );
        t.insert(
            keys::FAREWELL_NAMED,
            &["{name}, спасибо за звонок! Всего доброго.", "Спасибо, {name}! До свидания."],
        );

        t.insert(
            keys::SMS_QUOTE,
            &["Доставка {method}: {cost} руб., {days} дн. Адрес: {address}"],
        );
        t.insert(keys::SMS_ORDER_STATUS, &["Заказ {order_id}: {status}"]);

        t
    }

    /// Load overrides from YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|_| ConfigError::FileNotFound(path.as_ref().display().to_string()))?;

        let templates: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        templates.validate()?;
        Ok(templates)
    }

    /// Built-in catalog with the file's keys replacing built-in ones
    pub fn builtin_with_overrides<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let overrides = Self::load(path)?;
        let mut merged = Self::builtin();
        for (key, variants) in overrides.templates {
            merged.templates.insert(key, variants);
        }
        Ok(merged)
    }

    pub fn variants(&self, key: &str) -> Option<&[String]> {
        self.templates.get(key).map(|v| v.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn insert(&mut self, key: &str, variants: &[&str]) {
        self.templates
            .insert(key.to_string(), variants.iter().map(|s| s.to_string()).collect());
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, variants) in &self.templates {
            if variants.is_empty() || variants.iter().any(|v| v.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("prompts.{}", key),
                    message: "Every template needs at least one non-empty phrasing".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_engine_keys() {
        let t = PromptTemplates::builtin();
        for key in [
            keys::GREETING,
            keys::ORDER_STATUS,
            keys::SHIPPING_QUOTE,
            keys::ESCALATION_OFFER,
            keys::GUARD_TURN_LIMIT,
            keys::GUARD_TIME_LIMIT,
            keys::FAREWELL,
        ] {
            assert!(t.variants(key).is_some(), "missing {}", key);
        }
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_overrides_replace_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.yaml");
        std::fs::write(&path, "farewell:\n  - \"Пока!\"\ncustom:\n  - \"Привет\"\n").unwrap();

        let t = PromptTemplates::builtin_with_overrides(&path).unwrap();
        assert_eq!(t.variants(keys::FAREWELL).unwrap(), ["Пока!".to_string()]);
        assert!(t.variants("custom").is_some());
        assert!(t.variants(keys::GREETING).is_some());
    }

    #[test]
    fn test_empty_variant_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.yaml");
        std::fs::write(&path, "farewell: []\n").unwrap();

        assert!(matches!(
            PromptTemplates::load(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            PromptTemplates::load("/nonexistent/prompts.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
